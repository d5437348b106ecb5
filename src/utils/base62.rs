use thiserror::Error;

/// Symbols in value order: digits, upper case, lower case.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const BASE: u64 = 62;
pub const CODE_LENGTH: usize = 6;
/// 62^6 = 56_800_235_584 distinct codes.
pub const CODE_SPACE: u64 = BASE * BASE * BASE * BASE * BASE * BASE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Short code must be 6 characters, got {0}")]
    InvalidLength(usize),

    #[error("Invalid base62 character '{0}'")]
    InvalidCharacter(char),
}

/// Fold an identifier into the code space. Many identifiers share a result.
pub fn reduce(id: u64) -> u64 {
    id % CODE_SPACE
}

/// Encode `num` as exactly six base62 symbols, left-padded with `0`.
///
/// Values outside the code space are reduced first.
pub fn encode(num: u64) -> String {
    let mut num = reduce(num);
    let mut buf = [ALPHABET[0]; CODE_LENGTH];

    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(num % BASE) as usize];
        num /= BASE;
        if num == 0 {
            break;
        }
    }

    buf.iter().map(|&b| b as char).collect()
}

/// Inverse of [`encode`] over the code space.
pub fn decode(code: &str) -> Result<u64, CodecError> {
    let len = code.chars().count();
    if len != CODE_LENGTH {
        return Err(CodecError::InvalidLength(len));
    }

    code.chars().try_fold(0u64, |acc, c| {
        let digit = symbol_value(c).ok_or(CodecError::InvalidCharacter(c))?;
        Ok(acc * BASE + digit)
    })
}

/// Whether `code` has the shape of a generated short code.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn symbol_value(c: char) -> Option<u64> {
    match c {
        '0'..='9' => Some(c as u64 - '0' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 10),
        'a'..='z' => Some(c as u64 - 'a' as u64 + 36),
        _ => None,
    }
}
