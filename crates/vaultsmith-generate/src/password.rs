//! Random password generation
//!
//! A password is assembled from three character classes: letters, digits and
//! symbols. The policy fixes how many digits and symbols appear; the rest
//! are letters. Characters are drawn per class and then shuffled so class
//! positions carry no information.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use vaultsmith_common::crd::PasswordGenerator;
use zeroize::Zeroizing;

use crate::GenerateError;

/// Lowercase letters
pub const LOWER_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";
/// Uppercase letters
pub const UPPER_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Digits
pub const DIGITS: &str = "0123456789";
/// Symbols used when the policy does not restrict them
pub const DEFAULT_SYMBOLS: &str = "~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

/// Longest password the generator will produce
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// A validated password policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    length: usize,
    num_digits: usize,
    num_symbols: usize,
    allow_repeat: bool,
    letters: Vec<char>,
    symbols: Vec<char>,
}

impl PasswordPolicy {
    /// Validate a declared policy.
    ///
    /// Fails when no password can satisfy it: zero or oversized length,
    /// more digits and symbols than characters, symbols requested from an
    /// empty set, or more distinct characters requested from a class than
    /// the class has when repeats are not allowed.
    pub fn new(spec: &PasswordGenerator) -> Result<Self, GenerateError> {
        let length = spec.length as usize;
        let num_digits = spec.num_digits as usize;
        let num_symbols = spec.num_symbols as usize;

        if length == 0 {
            return Err(invalid("length must be greater than zero"));
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(invalid(format!(
                "length {length} exceeds the maximum of {MAX_PASSWORD_LENGTH}"
            )));
        }
        if num_digits + num_symbols > length {
            return Err(invalid(format!(
                "numDigits ({num_digits}) + numSymbols ({num_symbols}) exceeds length ({length})"
            )));
        }

        let symbols = match &spec.allowed_symbols {
            Some(allowed) => symbol_set(allowed)?,
            None => DEFAULT_SYMBOLS.chars().collect(),
        };
        if num_symbols > 0 && symbols.is_empty() {
            return Err(invalid("numSymbols requested but allowedSymbols is empty"));
        }

        let letters: Vec<char> = if spec.no_upper {
            LOWER_LETTERS.chars().collect()
        } else {
            LOWER_LETTERS.chars().chain(UPPER_LETTERS.chars()).collect()
        };

        let num_letters = length - num_digits - num_symbols;
        if !spec.allow_repeat {
            let classes = [
                ("letters", num_letters, letters.len()),
                ("digits", num_digits, DIGITS.len()),
                ("symbols", num_symbols, symbols.len()),
            ];
            for (class, wanted, available) in classes {
                if wanted > available {
                    return Err(invalid(format!(
                        "{wanted} {class} requested without repeats but only {available} are available"
                    )));
                }
            }
        }

        Ok(Self {
            length,
            num_digits,
            num_symbols,
            allow_repeat: spec.allow_repeat,
            letters,
            symbols,
        })
    }

    /// Generate a password from the operating system RNG
    pub fn generate(&self) -> Zeroizing<String> {
        self.generate_with(&mut OsRng)
    }

    /// Generate a password from the given RNG
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Zeroizing<String> {
        let digits: Vec<char> = DIGITS.chars().collect();
        let num_letters = self.length - self.num_digits - self.num_symbols;

        let mut chars: Zeroizing<Vec<char>> = Zeroizing::new(Vec::with_capacity(self.length));
        self.draw(rng, &self.letters, num_letters, &mut chars);
        self.draw(rng, &digits, self.num_digits, &mut chars);
        self.draw(rng, &self.symbols, self.num_symbols, &mut chars);
        chars.shuffle(rng);

        Zeroizing::new(chars.iter().collect())
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R, alphabet: &[char], count: usize, out: &mut Vec<char>) {
        if count == 0 {
            return;
        }
        if self.allow_repeat {
            out.extend((0..count).map(|_| alphabet[rng.gen_range(0..alphabet.len())]));
        } else {
            out.extend(alphabet.choose_multiple(rng, count).copied());
        }
    }
}

/// Parse `allowedSymbols` into a deduplicated set of symbol characters
fn symbol_set(allowed: &str) -> Result<Vec<char>, GenerateError> {
    let mut symbols = Vec::new();
    for c in allowed.chars() {
        if c.is_alphanumeric() || c.is_whitespace() || c.is_control() {
            return Err(invalid(format!(
                "allowedSymbols may only contain symbols, found {c:?}"
            )));
        }
        if !symbols.contains(&c) {
            symbols.push(c);
        }
    }
    Ok(symbols)
}

fn invalid(msg: impl Into<String>) -> GenerateError {
    GenerateError::InvalidPolicy(msg.into())
}
