//! Character-driven tokenizer with single-token lookahead and
//! context-sensitive digraph recognition (`||`, `&&`).

use crate::input::InputBuffer;
use crate::state::PromptMode;
use crate::token::{char_to_type, Token, TokenType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LexError {
    #[error("unexpected end of input")]
    UnexpectedEof,
}

/// Tokenizer over a shared `InputBuffer`. Holds at most one ungot token;
/// character-level state (the one-char pushback used while accreting a
/// STRING run) lives in the buffer itself.
pub struct Lexer {
    ungot: Option<Token>,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer { ungot: None }
    }

    /// Push one token back. A second call before the next `next_token`
    /// overwrites the first slot — callers must not rely on more than one
    /// level of pushback, matching the source's deliberate simplification.
    pub fn unget_token(&mut self, t: Token) {
        self.ungot = Some(t);
    }

    /// Read the next token from `buf`, requesting continuation lines under
    /// `mode` when the buffer runs dry mid-token. Returns `None` only at
    /// true end of input with nothing pending.
    pub fn next_token(&mut self, buf: &mut InputBuffer, mode: PromptMode) -> Option<Token> {
        if let Some(t) = self.ungot.take() {
            return Some(t);
        }

        let c = match buf.next_char(mode) {
            Some(c) => c,
            None => return Some(Token::new(TokenType::Eof)),
        };

        if c == crate::input::EOF_SENTINEL {
            return Some(Token::new(TokenType::Eof));
        }

        let kind = char_to_type(c);
        match kind {
            TokenType::String(_) => {
                let mut s = String::new();
                s.push(c);
                loop {
                    match buf.next_char(mode) {
                        Some(next) if next == crate::input::EOF_SENTINEL => {
                            buf.unget_char(next);
                            break;
                        }
                        Some(next) => match char_to_type(next) {
                            TokenType::String(_) => s.push(next),
                            _ => {
                                buf.unget_char(next);
                                break;
                            }
                        },
                        None => break,
                    }
                }
                Some(Token::new(TokenType::String(s)))
            }
            TokenType::Pipe => {
                self.maybe_collapse_digraph(buf, mode, '|', TokenType::Pipe, TokenType::Or)
            }
            TokenType::Ampersand => {
                self.maybe_collapse_digraph(buf, mode, '&', TokenType::Ampersand, TokenType::And)
            }
            other => Some(Token::new(other)),
        }
    }

    /// After producing a token of `first_kind`, peek exactly one more raw
    /// character (not a full token): if it is `punct` again, collapse the
    /// pair into `collapsed`; otherwise unget the character and emit
    /// `first_kind` alone. Peeking a character rather than recursing into
    /// `next_token` is what keeps this single-step: a run like `|||` only
    /// ever looks one character past the one it just classified, so the
    /// single ungot slot is never asked to hold more than that one
    /// character, and the third `|` simply comes back out as its own token
    /// on the next call instead of re-entering this collapse.
    fn maybe_collapse_digraph(
        &mut self,
        buf: &mut InputBuffer,
        mode: PromptMode,
        punct: char,
        first_kind: TokenType,
        collapsed: TokenType,
    ) -> Option<Token> {
        match buf.next_char(mode) {
            Some(c) if c == punct => Some(Token::new(collapsed)),
            Some(c) => {
                buf.unget_char(c);
                Some(Token::new(first_kind))
            }
            None => Some(Token::new(first_kind)),
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputBuffer, StringSource};

    fn tokens_of(s: &str) -> Vec<TokenType> {
        let mut buf = InputBuffer::new(Box::new(StringSource::new(s)));
        let mut lex = Lexer::new();
        let mut out = Vec::new();
        loop {
            match lex.next_token(&mut buf, PromptMode::Ps1) {
                Some(Token {
                    kind: TokenType::Eof,
                }) => break,
                Some(t) => out.push(t.kind),
                None => break,
            }
        }
        out
    }

    #[test]
    fn accretes_string_run() {
        let toks = tokens_of("hello");
        assert_eq!(toks, vec![TokenType::String("hello".into())]);
    }

    #[test]
    fn splits_on_space() {
        let toks = tokens_of("ls -la");
        assert_eq!(
            toks,
            vec![
                TokenType::String("ls".into()),
                TokenType::Space,
                TokenType::String("-la".into()),
            ]
        );
    }

    #[test]
    fn collapses_pipe_pipe_into_or() {
        let toks = tokens_of("a||b");
        assert_eq!(
            toks,
            vec![
                TokenType::String("a".into()),
                TokenType::Or,
                TokenType::String("b".into()),
            ]
        );
    }

    #[test]
    fn collapses_amp_amp_into_and() {
        let toks = tokens_of("a&&b");
        assert_eq!(
            toks,
            vec![
                TokenType::String("a".into()),
                TokenType::And,
                TokenType::String("b".into()),
            ]
        );
    }

    #[test]
    fn single_pipe_stays_single() {
        let toks = tokens_of("a|b");
        assert_eq!(
            toks,
            vec![
                TokenType::String("a".into()),
                TokenType::Pipe,
                TokenType::String("b".into()),
            ]
        );
    }

    #[test]
    fn triple_pipe_does_not_recurse_into_second_or() {
        let toks = tokens_of("|||");
        assert_eq!(toks, vec![TokenType::Or, TokenType::Pipe]);
    }

    #[test]
    fn unget_returns_pushed_token_once() {
        let mut buf = InputBuffer::new(Box::new(StringSource::new("a b")));
        let mut lex = Lexer::new();
        let t1 = lex.next_token(&mut buf, PromptMode::Ps1).unwrap();
        lex.unget_token(t1.clone());
        let t2 = lex.next_token(&mut buf, PromptMode::Ps1).unwrap();
        assert_eq!(t1.kind, t2.kind);
    }
}
