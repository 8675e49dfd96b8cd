use std::fmt;

use rmpv::Value;

/// Argument arity, mirroring `:command -nargs`.
#[allow(dead_code)] // MyPluginFoo only declares Zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nargs {
    /// `-nargs=0`
    Zero,
    /// `-nargs=1`
    One,
    /// `-nargs=?`
    Optional,
    /// `-nargs=*`
    Any,
    /// `-nargs=+`
    AtLeastOne,
}

impl Nargs {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Nargs::Zero => count == 0,
            Nargs::One => count == 1,
            Nargs::Optional => count <= 1,
            Nargs::Any => true,
            Nargs::AtLeastOne => count >= 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Nargs::Zero => "0",
            Nargs::One => "1",
            Nargs::Optional => "?",
            Nargs::Any => "*",
            Nargs::AtLeastOne => "+",
        }
    }
}

impl fmt::Display for Nargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub nargs: Nargs,
    /// Sync commands are invoked with `rpcrequest`, the rest with `rpcnotify`.
    pub sync: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, nargs: Nargs) -> Self {
        Self {
            name: name.into(),
            nargs,
            sync: false,
        }
    }

    /// The entry Neovim expects in a `specs` answer.
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from("type"), Value::from("command")),
            (Value::from("name"), Value::from(self.name.as_str())),
            (Value::from("sync"), Value::from(self.sync)),
            (
                Value::from("opts"),
                Value::Map(vec![(Value::from("nargs"), Value::from(self.nargs.as_str()))]),
            ),
        ])
    }
}
