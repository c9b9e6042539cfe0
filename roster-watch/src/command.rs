//! Line commands typed at the prompt.

use roster_sync::{UserId, UserPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the replica
    List,
    /// Start a creation form
    New,
    /// Start editing an existing user
    Edit(UserId),
    /// Set one draft field
    Set(Field, String),
    /// Submit the draft
    Save,
    /// Drop the draft
    Cancel,
    /// Delete a user
    Remove(UserId),
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Firstname,
    Lastname,
    Nickname,
    Email,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "firstname" | "first" => Some(Field::Firstname),
            "lastname" | "last" => Some(Field::Lastname),
            "nickname" | "nick" => Some(Field::Nickname),
            "email" => Some(Field::Email),
            _ => None,
        }
    }

    pub fn assign(self, draft: &mut UserPatch, value: String) {
        let slot = match self {
            Field::Firstname => &mut draft.firstname,
            Field::Lastname => &mut draft.lastname,
            Field::Nickname => &mut draft.nickname,
            Field::Email => &mut draft.email,
        };
        *slot = Some(value);
    }
}

pub const HELP: &str = "\
commands:
  ls                    show users
  new                   start a new user form
  edit <id>             edit user <id>
  set <field> <value>   field: first | last | nick | email
  save                  submit the form
  cancel                drop the form
  rm <id>               delete user <id>
  quit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match word {
            "ls" | "list" => Ok(Command::List),
            "new" => Ok(Command::New),
            "edit" => parse_id(rest).map(Command::Edit),
            "rm" | "delete" => parse_id(rest).map(Command::Remove),
            "set" => {
                let (name, value) = rest
                    .split_once(' ')
                    .ok_or_else(|| "usage: set <field> <value>".to_string())?;
                let field = Field::parse(name).ok_or_else(|| format!("unknown field `{name}`"))?;
                Ok(Command::Set(field, value.trim().to_string()))
            }
            "save" => Ok(Command::Save),
            "cancel" => Ok(Command::Cancel),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err(String::new()),
            other => Err(format!("unknown command `{other}` (try `help`)")),
        }
    }
}

fn parse_id(text: &str) -> Result<UserId, String> {
    text.parse().map_err(|_| format!("expected a user id, got `{text}`"))
}
