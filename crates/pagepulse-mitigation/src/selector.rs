//! 간이 CSS 선택자.
//!
//! 지원: 태그, `*`, `.class`, `[attr]`, `[attr="v"]`, `:not(단순 선택자)`, 쉼표 목록.
//! 자손/자식 결합자는 지원하지 않는다.

use std::collections::BTreeMap;

use pagepulse_core::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Class(String),
    Attr { name: String, value: Option<String> },
    Not(Box<Simple>),
}

impl Simple {
    fn matches(&self, tag: &str, attrs: &BTreeMap<String, String>) -> bool {
        match self {
            Simple::Tag(expected) => tag.eq_ignore_ascii_case(expected),
            Simple::Class(class) => attrs
                .get("class")
                .is_some_and(|v| v.split_whitespace().any(|c| c == class)),
            Simple::Attr { name, value } => match (attrs.get(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            Simple::Not(inner) => !inner.matches(tag, attrs),
        }
    }
}

/// 파싱된 선택자 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Vec<Simple>>,
}

impl Selector {
    /// 선택자 파싱
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let chars: Vec<char> = input.chars().collect();
        let mut parser = Parser { chars, pos: 0 };
        let mut alternatives = Vec::new();

        loop {
            alternatives.push(parser.compound()?);
            match parser.peek() {
                Some(',') => parser.pos += 1,
                None => break,
                Some(c) => return Err(parser.error(&format!("예상치 못한 문자 '{c}'"))),
            }
        }

        Ok(Self { alternatives })
    }

    /// 요소가 목록 중 하나라도 일치하는지
    pub fn matches(&self, tag: &str, attrs: &BTreeMap<String, String>) -> bool {
        self.alternatives
            .iter()
            .any(|compound| compound.iter().all(|s| s.matches(tag, attrs)))
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> CoreError {
        let input: String = self.chars.iter().collect();
        CoreError::Dom(format!("선택자 '{input}' {}번째 문자: {message}", self.pos))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn expect(&mut self, expected: char) -> Result<(), CoreError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("'{expected}' 필요")))
        }
    }

    fn compound(&mut self) -> Result<Vec<Simple>, CoreError> {
        self.skip_whitespace();
        let mut parts = Vec::new();

        match self.peek() {
            Some('*') => self.pos += 1,
            Some(c) if c.is_ascii_alphabetic() => {
                parts.push(Simple::Tag(self.ident().to_ascii_lowercase()));
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') | Some('[') | Some(':') => parts.push(self.simple()?),
                Some(c) if c.is_whitespace() => {
                    self.skip_whitespace();
                    if !matches!(self.peek(), None | Some(',')) {
                        return Err(self.error("결합자는 지원하지 않음"));
                    }
                    break;
                }
                _ => break,
            }
        }

        if parts.is_empty() && self.chars.get(self.pos.saturating_sub(1)) != Some(&'*') {
            return Err(self.error("빈 선택자"));
        }
        Ok(parts)
    }

    fn simple(&mut self) -> Result<Simple, CoreError> {
        match self.peek() {
            Some('.') => {
                self.pos += 1;
                let class = self.ident();
                if class.is_empty() {
                    return Err(self.error("클래스 이름 필요"));
                }
                Ok(Simple::Class(class))
            }
            Some('[') => {
                self.pos += 1;
                self.skip_whitespace();
                let name = self.ident().to_ascii_lowercase();
                if name.is_empty() {
                    return Err(self.error("속성 이름 필요"));
                }
                self.skip_whitespace();
                let value = if self.peek() == Some('=') {
                    self.pos += 1;
                    self.skip_whitespace();
                    Some(self.attr_value()?)
                } else {
                    None
                };
                self.skip_whitespace();
                self.expect(']')?;
                Ok(Simple::Attr { name, value })
            }
            Some(':') => {
                self.pos += 1;
                let pseudo = self.ident();
                if !pseudo.eq_ignore_ascii_case("not") {
                    return Err(self.error(&format!("지원하지 않는 의사 클래스 :{pseudo}")));
                }
                self.expect('(')?;
                self.skip_whitespace();
                let inner = match self.peek() {
                    Some(c) if c.is_ascii_alphabetic() => {
                        Simple::Tag(self.ident().to_ascii_lowercase())
                    }
                    _ => self.simple()?,
                };
                self.skip_whitespace();
                self.expect(')')?;
                Ok(Simple::Not(Box::new(inner)))
            }
            _ => Err(self.error("단순 선택자 필요")),
        }
    }

    fn attr_value(&mut self) -> Result<String, CoreError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.expect(quote)?;
                Ok(value)
            }
            _ => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ']' && !c.is_whitespace()) {
                    self.pos += 1;
                }
                Ok(self.chars[start..self.pos].iter().collect())
            }
        }
    }
}
