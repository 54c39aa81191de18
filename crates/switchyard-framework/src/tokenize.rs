//! Tokenizer for text commands.
//!
//! Splits raw input on whitespace. A `"` toggles quoting (the quote itself is
//! dropped) and `\` escapes the next character, so `\"` is a literal quote.
//! Escaping does not protect whitespace: outside quotes an escaped space still
//! separates tokens. Tokens that start with `-` and are longer than one
//! character are flags:
//!
//! - `-name` sets `name` to the empty string
//! - `-name=value` sets `name` to `value`
//!
//! Every other token is an argument.

use std::collections::HashMap;

/// The result of tokenizing a line of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedInput {
    raw: String,
    args: Vec<String>,
    flags: HashMap<String, String>,
}

impl TokenizedInput {
    /// Builds an input from already-separated arguments, with no flags.
    pub fn from_args(args: Vec<String>) -> Self {
        Self {
            raw: args.join(" "),
            args,
            flags: HashMap::new(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flags(&self) -> &HashMap<String, String> {
        &self.flags
    }

    /// Value of a flag; `Some("")` for a flag given without `=value`.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    /// Returns exactly `n` argument slots.
    ///
    /// Surplus trailing arguments are merged into the last slot, joined by a
    /// single space. Missing slots are `None`. With `n == 0` any arguments
    /// are still merged into a single slot, so nothing is silently lost.
    pub fn args_fitted(&self, n: usize) -> Vec<Option<String>> {
        fit_args(&self.args, n)
    }

    /// Splits into `(args, flags)`.
    pub fn into_parts(self) -> (Vec<String>, HashMap<String, String>) {
        (self.args, self.flags)
    }
}

/// Fits `args` into exactly `n` slots. See [`TokenizedInput::args_fitted`].
pub fn fit_args(args: &[String], n: usize) -> Vec<Option<String>> {
    if n == 0 {
        return match args {
            [] => Vec::new(),
            _ => vec![Some(args.join(" "))],
        };
    }
    let mut fitted: Vec<Option<String>> = args.iter().take(n).cloned().map(Some).collect();
    if args.len() > n {
        let tail = args[n - 1..].join(" ");
        fitted[n - 1] = Some(tail);
    }
    fitted.resize(n, None);
    fitted
}

/// Tokenizes `raw` into arguments and flags.
pub fn tokenize(raw: &str) -> TokenizedInput {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaping = false;

    for ch in raw.trim().chars() {
        let escaped = std::mem::take(&mut escaping);
        match ch {
            '\\' if !escaped => escaping = true,
            '"' if !escaped => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    let mut args = Vec::new();
    let mut flags = HashMap::new();
    for token in tokens {
        match token.strip_prefix('-') {
            Some(flag) if !flag.is_empty() => {
                let (name, value) = flag.split_once('=').unwrap_or((flag, ""));
                flags.insert(name.to_string(), value.to_string());
            }
            _ => args.push(token),
        }
    }

    TokenizedInput {
        raw: raw.to_string(),
        args,
        flags,
    }
}
