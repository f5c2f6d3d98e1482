use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ErrorKind, Result, SimError};
use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

lazy_static! {
    static ref LABEL: Regex = Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap();
}

/// Piece of a line along with where it was found.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

/// One source line split into its parts. Text is upper-cased and comments are dropped.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    /// Zero-based line index
    pub index: usize,
    /// Whole line, excluding the line terminator
    pub span: Span,
    pub label: Option<Token>,
    pub mnemonic: Option<Token>,
    /// Everything after the mnemonic with whitespace removed
    pub operand: Option<Token>,
}

impl Line {
    /// Blank lines contribute no bytes, though they may still carry a label.
    pub fn is_blank(&self) -> bool {
        self.mnemonic.is_none()
    }

    /// Span of the instruction part, for diagnostics.
    pub fn instr_span(&self) -> Span {
        match (&self.mnemonic, &self.operand) {
            (Some(m), Some(op)) => {
                Span::new(SrcOffset(m.span.offs()), op.span.end() - m.span.offs())
            }
            (Some(m), None) => m.span,
            _ => self.span,
        }
    }
}

/// Split a whole program into lines.
pub fn lex(src: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (index, raw) in src.split_inclusive('\n').enumerate() {
        let text = raw.trim_end_matches(['\n', '\r']);
        lines.push(lex_line(text, index, offset)?);
        offset += raw.len();
    }
    Ok(lines)
}

/// Lex one line found at byte `offset` of the file.
pub fn lex_line(text: &str, index: usize, offset: usize) -> Result<Line> {
    // ASCII upper-casing keeps byte offsets intact
    let upper = text.to_ascii_uppercase();
    let code = match upper.find(';') {
        Some(comment) => &upper[..comment],
        None => upper.as_str(),
    };

    let mut cursor = Cursor::new(code, offset);
    let line_span = cursor.span(0, text.len());

    let label = match code.find(':') {
        Some(colon) => {
            cursor.skip_whitespace();
            let start = cursor.pos();
            let name = code[start..colon].trim_end();
            let span = cursor.span(start, name.len().max(1));
            if !LABEL.is_match(name) {
                let message = if name.is_empty() {
                    "empty label declaration".to_string()
                } else {
                    format!("invalid label name `{name}`")
                };
                return Err(SimError::new(ErrorKind::SyntaxError, message).at(index, span));
            }
            cursor.take_while(|c| c != ':');
            cursor.bump();
            Some(Token {
                text: name.to_string(),
                span,
            })
        }
        None => None,
    };

    cursor.skip_whitespace();
    let mnemonic = if cursor.is_eol() {
        None
    } else {
        let start = cursor.pos();
        let text = cursor.take_while(|c| !c.is_whitespace());
        Some(Token {
            text: text.to_string(),
            span: cursor.span(start, text.len()),
        })
    };

    cursor.skip_whitespace();
    let operand = if cursor.is_eol() {
        None
    } else {
        let start = cursor.pos();
        let rest = cursor.rest().trim_end();
        Some(Token {
            text: rest.split_whitespace().collect(),
            span: cursor.span(start, rest.len()),
        })
    };

    Ok(Line {
        index,
        span: line_span,
        label,
        mnemonic,
        operand,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn text(token: &Option<Token>) -> Option<&str> {
        token.as_ref().map(|t| t.text.as_str())
    }

    #[test]
    fn splits_line_parts() {
        let line = lex_line("loop: adda #$10 ; add it", 0, 0).unwrap();
        assert_eq!(text(&line.label), Some("LOOP"));
        assert_eq!(text(&line.mnemonic), Some("ADDA"));
        assert_eq!(text(&line.operand), Some("#$10"));
        let span = line.mnemonic.unwrap().span;
        assert_eq!((span.offs(), span.len()), (6, 4));
    }

    #[test]
    fn operand_whitespace_removed() {
        let line = lex_line("   LDA  $10 , X   ", 3, 100).unwrap();
        assert_eq!(line.index, 3);
        assert_eq!(text(&line.operand), Some("$10,X"));
        let span = line.operand.unwrap().span;
        assert_eq!((span.offs(), span.len()), (108, 7));
    }

    #[test]
    fn blank_and_label_only_lines() {
        let line = lex_line("   ; only a comment", 0, 0).unwrap();
        assert!(line.is_blank() && line.label.is_none());
        let line = lex_line("START:", 0, 0).unwrap();
        assert!(line.is_blank());
        assert_eq!(text(&line.label), Some("START"));
    }

    #[test]
    fn colon_inside_comment_is_not_a_label() {
        let line = lex_line("NOP ; note: nothing", 0, 0).unwrap();
        assert!(line.label.is_none());
        assert_eq!(text(&line.mnemonic), Some("NOP"));
    }

    #[test]
    fn rejects_bad_labels() {
        let err = lex_line("1ABC: NOP", 4, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert_eq!(err.line, Some(5));
        assert!(lex_line(": NOP", 0, 0).is_err());
    }

    #[test]
    fn lexes_whole_program_with_offsets() {
        let lines = lex("LDA #1\r\n\nEND").unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_blank());
        assert_eq!(lines[2].mnemonic.as_ref().unwrap().span.offs(), 9);
    }
}
