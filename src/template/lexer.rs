//! Tokenizer shared by the path-name and file-content placeholder grammars.

use crate::constants::{content_markers, path_markers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Separator(String),
    /// A run of consecutive newlines.
    LineFeed(usize),
    Start,
    End,
    EntryStart,
    EntryEnd,
    Key,
    NameSeparator,
    Condition,
}

/// Which marker set is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Path,
    Content,
}

impl Grammar {
    fn marker(self, c: char) -> Option<Token> {
        match self {
            Grammar::Path => match c {
                path_markers::START => Some(Token::Start),
                path_markers::END => Some(Token::End),
                path_markers::KEY => Some(Token::Key),
                _ => None,
            },
            Grammar::Content => match c {
                content_markers::START => Some(Token::Start),
                content_markers::END => Some(Token::End),
                content_markers::ENTRY_START => Some(Token::EntryStart),
                content_markers::ENTRY_END => Some(Token::EntryEnd),
                content_markers::CONDITION => Some(Token::Condition),
                content_markers::SEPARATOR => Some(Token::NameSeparator),
                content_markers::KEY => Some(Token::Key),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Blank,
    Newline,
    Text,
}

impl CharClass {
    fn of(c: char) -> Self {
        match c {
            ' ' | '\t' => CharClass::Blank,
            '\n' => CharClass::Newline,
            _ => CharClass::Text,
        }
    }
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    grammar: Grammar,
}

impl Lexer {
    pub fn new(input: &str, grammar: Grammar) -> Self {
        Self { chars: input.chars().collect(), pos: 0, grammar }
    }

    /// Returns the next token, or `None` once the input is exhausted.
    pub fn next_token(&mut self) -> Option<Token> {
        let first = *self.chars.get(self.pos)?;
        if let Some(token) = self.grammar.marker(first) {
            self.pos += 1;
            return Some(token);
        }

        let class = CharClass::of(first);
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if CharClass::of(c) != class || self.grammar.marker(c).is_some() {
                break;
            }
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        Some(match class {
            CharClass::Blank => Token::Separator(text),
            CharClass::Newline => Token::LineFeed(self.pos - start),
            CharClass::Text => Token::Word(text),
        })
    }

    /// Moves the read position back by `chars` characters.
    pub fn go_back(&mut self, chars: usize) {
        self.pos = self.pos.saturating_sub(chars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str, grammar: Grammar) -> Vec<Token> {
        let mut lexer = Lexer::new(input, grammar);
        std::iter::from_fn(|| lexer.next_token()).collect()
    }

    #[test]
    fn splits_path_names() {
        assert_eq!(
            collect("{!entity_name}.go", Grammar::Path),
            vec![
                Token::Start,
                Token::Key,
                Token::Word("entity_name".into()),
                Token::End,
                Token::Word(".go".into()),
            ]
        );
    }

    #[test]
    fn content_markers_are_not_path_markers() {
        assert_eq!(
            collect("{x}", Grammar::Content),
            vec![Token::Word("{x}".into())]
        );
    }

    #[test]
    fn groups_blanks_and_newlines() {
        assert_eq!(
            collect("a \t▶⬇b➡c◀\n\n", Grammar::Content),
            vec![
                Token::Word("a".into()),
                Token::Separator(" \t".into()),
                Token::Start,
                Token::Key,
                Token::Word("b".into()),
                Token::NameSeparator,
                Token::Word("c".into()),
                Token::End,
                Token::LineFeed(2),
            ]
        );
    }

    #[test]
    fn go_back_relexes_part_of_a_run() {
        let mut lexer = Lexer::new("⏪\n\n\nx", Grammar::Content);
        assert_eq!(lexer.next_token(), Some(Token::EntryEnd));
        assert_eq!(lexer.next_token(), Some(Token::LineFeed(3)));
        lexer.go_back(2);
        assert_eq!(lexer.next_token(), Some(Token::LineFeed(2)));
        assert_eq!(lexer.next_token(), Some(Token::Word("x".into())));
        assert_eq!(lexer.next_token(), None);
    }
}
