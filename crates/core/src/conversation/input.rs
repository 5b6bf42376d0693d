//! Lenient parsing of numbers typed into the chat. A leading number is taken
//! and trailing text such as units is ignored; a comma counts as the decimal
//! separator.

use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("not a number")]
    NotANumber,
    #[error("must be greater than zero")]
    NotPositive,
    #[error("must be between {min} and {max}")]
    OutOfRange { min: Decimal, max: Decimal },
}

fn leading_number(text: &str) -> &str {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_digit() || *ch == '.' || *ch == ','))
        .map(|(index, _)| index)
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

fn parse_decimal(text: &str) -> Result<Decimal, InputError> {
    let number = leading_number(text).replace(',', ".");
    if number.is_empty() {
        return Err(InputError::NotANumber);
    }
    Decimal::from_str(&number).map_err(|_| InputError::NotANumber)
}

/// Area or piece quantity; must be positive.
pub fn parse_quantity(text: &str) -> Result<Decimal, InputError> {
    let quantity = parse_decimal(text)?;
    if quantity <= Decimal::ZERO {
        return Err(InputError::NotPositive);
    }
    Ok(quantity)
}

/// Whole millimeters; fractional input is truncated.
pub fn parse_millimeters(text: &str) -> Result<u32, InputError> {
    let value = leading_number(text);
    let whole = value.split(['.', ',']).next().unwrap_or_default();
    if whole.is_empty() {
        return Err(InputError::NotANumber);
    }
    let millimeters: u32 = whole.parse().map_err(|_| InputError::NotANumber)?;
    if millimeters == 0 {
        return Err(InputError::NotPositive);
    }
    Ok(millimeters)
}

pub fn parse_discount_percent(text: &str) -> Result<Decimal, InputError> {
    let percent = parse_decimal(text)?;
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(InputError::OutOfRange { min: Decimal::ZERO, max: Decimal::ONE_HUNDRED });
    }
    Ok(percent)
}
