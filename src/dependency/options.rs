//!
//! The ahead-of-link compiler options.
//!

use crate::error::Error;

///
/// Splits `options` into words the way a POSIX shell does.
///
/// Supports single quotes, double quotes and backslash escapes. No expansion is performed.
///
pub fn split(options: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut characters = options.chars();

    while let Some(character) = characters.next() {
        match character {
            '\'' => {
                in_word = true;
                loop {
                    match characters.next() {
                        Some('\'') => break,
                        Some(character) => word.push(character),
                        None => return Err(unterminated(options, '\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match characters.next() {
                        Some('"') => break,
                        Some('\\') => match characters.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => word.push(escaped),
                            Some('\n') => {}
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => return Err(unterminated(options, '"')),
                        },
                        Some(character) => word.push(character),
                        None => return Err(unterminated(options, '"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match characters.next() {
                    Some('\n') => {}
                    Some(escaped) => word.push(escaped),
                    None => {
                        return Err(Error::Configuration(format!(
                            "compiler options `{}` end with an escape character",
                            options
                        ))
                        .into())
                    }
                }
            }
            character if character.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            character => {
                in_word = true;
                word.push(character);
            }
        }
    }
    if in_word {
        words.push(word);
    }

    Ok(words)
}

fn unterminated(options: &str, quote: char) -> anyhow::Error {
    Error::Configuration(format!(
        "compiler options `{}` contain an unterminated {} quote",
        options, quote
    ))
    .into()
}
