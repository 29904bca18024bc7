use std::fmt::{self, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Normal,
    Moderate,
    Low,
    Critical,
}

/// A procstats state tag such as `0n` or `1mt`.
///
/// The first character is the screen state, the second the memory pressure
/// and the optional third the process state. Process-bearing codes written by
/// newer platforms may append further lowercase qualifiers, those are kept in
/// `qualifier` but are not part of the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCode {
    pub screen: Screen,
    pub memory: Memory,
    pub process: Option<char>,
    pub qualifier: String,
}

impl Screen {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Off),
            '1' => Some(Self::On),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            Self::Off => '0',
            Self::On => '1',
        }
    }
}

impl Memory {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'n' => Some(Self::Normal),
            'm' => Some(Self::Moderate),
            'l' => Some(Self::Low),
            'c' => Some(Self::Critical),
            _ => None,
        }
    }

    fn as_char(&self) -> char {
        match self {
            Self::Normal => 'n',
            Self::Moderate => 'm',
            Self::Low => 'l',
            Self::Critical => 'c',
        }
    }
}

impl StateCode {
    /// Parse a state code, `with_process` selects between the 2 and 3
    /// character forms. Returns `None` for anything malformed.
    pub fn parse(code: &str, with_process: bool) -> Option<Self> {
        let mut chars = code.chars();
        let screen = Screen::from_char(chars.next()?)?;
        let memory = Memory::from_char(chars.next()?)?;

        if !with_process {
            return match chars.next() {
                None => Some(Self {
                    screen,
                    memory,
                    process: None,
                    qualifier: String::new(),
                }),
                Some(_) => None,
            };
        }

        let process = chars.next().filter(|it| it.is_ascii_lowercase())?;
        let qualifier: String = chars.collect();
        if !qualifier.chars().all(|it| it.is_ascii_lowercase()) {
            return None;
        }
        Some(Self {
            screen,
            memory,
            process: Some(process),
            qualifier,
        })
    }

    /// The 2 or 3 character code, without any qualifier
    pub fn as_code(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(self.screen.as_char());
        s.push(self.memory.as_char());
        if let Some(p) = self.process {
            s.push(p);
        }
        s
    }
}

impl Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}
