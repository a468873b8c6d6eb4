//! Fixed-schema record codec: `[id:4 | username:33 | email:256]`.

pub const ID_SIZE: usize = 4;
pub const USERNAME_SIZE: usize = 33;
pub const EMAIL_SIZE: usize = 256;
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

/// Maximum printable length of `username`/`email`, one byte short of the
/// buffer capacity to leave room for the null terminator.
pub const MAX_USERNAME_LEN: usize = USERNAME_SIZE - 1;
pub const MAX_EMAIL_LEN: usize = EMAIL_SIZE - 1;

/// A single record: an id plus two null-terminated, fixed-capacity strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

impl Row {
    /// Builds a row from already-validated field values.
    ///
    /// `username`/`email` must be at most `MAX_USERNAME_LEN`/`MAX_EMAIL_LEN`
    /// bytes; callers are expected to have rejected longer values already
    /// ("String is too long.").
    pub fn new(id: u32, username: &str, email: &str) -> Self {
        let mut row = Row {
            id,
            username: [0; USERNAME_SIZE],
            email: [0; EMAIL_SIZE],
        };
        let u = username.as_bytes();
        row.username[..u.len()].copy_from_slice(u);
        let e = email.as_bytes();
        row.email[..e.len()].copy_from_slice(e);
        row
    }

    pub fn username_str(&self) -> &str {
        c_str(&self.username)
    }

    pub fn email_str(&self) -> &str {
        c_str(&self.email)
    }

    /// Copies this row's fields into `buf[..ROW_SIZE]` at their fixed offsets.
    pub fn serialize(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= ROW_SIZE);
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
    }

    /// The inverse of `serialize`.
    pub fn deserialize(buf: &[u8]) -> Row {
        debug_assert!(buf.len() >= ROW_SIZE);
        let id = u32::from_le_bytes(buf[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        let mut username = [0u8; USERNAME_SIZE];
        username.copy_from_slice(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let mut email = [0u8; EMAIL_SIZE];
        email.copy_from_slice(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Row { id, username, email }
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username_str(), self.email_str())
    }
}

fn c_str(buf: &[u8]) -> &str {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..len]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let row = Row::new(7, "alice", "alice@example.com");
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let back = Row::deserialize(&buf);
        assert_eq!(row, back);
    }

    #[test]
    fn round_trip_at_capacity() {
        let username = "a".repeat(MAX_USERNAME_LEN);
        let email = "b".repeat(MAX_EMAIL_LEN);
        let row = Row::new(1, &username, &email);
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let back = Row::deserialize(&buf);
        assert_eq!(row, back);
        assert_eq!(back.username_str(), username);
        assert_eq!(back.email_str(), email);
    }

    #[test]
    fn row_size_is_fixed() {
        assert_eq!(ROW_SIZE, 293);
    }
}
