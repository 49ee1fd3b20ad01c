use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    DarkGray,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    fn fg(self) -> u8 {
        match self {
            Self::DarkGray => 90,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
        }
    }
}

/// Decides whether output carries ANSI color codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub const PLAIN: Self = Self { enabled: false };

    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn paint<T>(self, color: Color, value: T) -> Painted<T> {
        Painted {
            color: self.enabled.then_some(color),
            value,
        }
    }
}

pub struct Painted<T> {
    color: Option<Color>,
    value: T,
}

impl<T> fmt::Display for Painted<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = &self.value;
        match self.color {
            Some(color) => {
                let fg = color.fg();
                write!(f, "\x1B[{fg};1m{value}\x1B[0m")
            }
            None => write!(f, "{value}"),
        }
    }
}
