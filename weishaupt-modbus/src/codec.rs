pub use tokio_modbus::{Address, Quantity};

/// 16-bit value stored in Modbus register.
pub type Word = u16;

/// Signed value the heat pump keeps in a single register.
pub type RawValue = i16;

/// A response carried a different number of registers than requested.
#[derive(Debug, PartialEq, Eq)]
pub struct WordsCountError {
    pub found: usize,
}

/// Reinterpret the only word of a one-register response as two's complement.
pub fn decode(words: &[Word]) -> Result<RawValue, WordsCountError> {
    match words {
        [word] => Ok(RawValue::from_be_bytes(word.to_be_bytes())),
        _ => Err(WordsCountError { found: words.len() }),
    }
}

pub fn encode(value: RawValue) -> Word {
    Word::from_be_bytes(value.to_be_bytes())
}
