//! Scene state machine.
//!
//! Each scene is an isolated command namespace. The active scene decides
//! which table a command is looked up in; commands from other scenes are
//! unknown until the user gets there. Transitions are plain data:
//! `(scene, command) -> (next scene, command kind)`.

use std::fmt;

/// Conversation mode. Exactly one is active per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scene {
    #[default]
    Root,
    Watchlist,
    Lending,
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scene::Root => write!(f, "root"),
            Scene::Watchlist => write!(f, "watchlist"),
            Scene::Lending => write!(f, "lending"),
        }
    }
}

/// What a command resolves to in a given scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    // Root
    Help,
    StartLending,
    StopLending,
    Balance,
    EnterWatchlist,
    EnterLending,
    Whois,
    // Watchlist scene
    ListCatalog,
    UpdateCatalog,
    ShowWatchlist,
    AddTicker,
    RemoveTicker,
    // Lending scene
    TopRates,
    TopCryptoRates,
    WatchlistRates,
    // Any scene other than root
    Back,
    /// Not in the active scene's table.
    Unknown,
}

const ROOT_COMMANDS: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("start", CommandKind::StartLending),
    ("stop", CommandKind::StopLending),
    ("balance", CommandKind::Balance),
    ("watchlist", CommandKind::EnterWatchlist),
    ("lending", CommandKind::EnterLending),
    ("whois", CommandKind::Whois),
];

const WATCHLIST_COMMANDS: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("list", CommandKind::ListCatalog),
    ("update", CommandKind::UpdateCatalog),
    ("current", CommandKind::ShowWatchlist),
    ("add", CommandKind::AddTicker),
    ("remove", CommandKind::RemoveTicker),
    ("back", CommandKind::Back),
];

const LENDING_COMMANDS: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("top10", CommandKind::TopRates),
    ("top10crypto", CommandKind::TopCryptoRates),
    ("watchlist", CommandKind::WatchlistRates),
    ("back", CommandKind::Back),
];

const ROOT_HELP: &str = "List of commands:
/watchlist - Enter watchlist scene
/lending - Enter lending scene
/whois <coin> - Check the full name of the coin
/balance - Show your non-zero balances
/start - Start auto-compounding
/stop - Stop lending";

const WATCHLIST_HELP: &str = "List of available commands:
/list - List of coins available for lending
/update - Update local database
/current - Display current watchlist
/add <coin> - Add coin to your watchlist
/remove <coin> - Remove coin from your watchlist
/back - Return to main menu
";

const LENDING_HELP: &str = "List of available commands:
/top10 - Top 10 estimated rates for the next hour
/top10crypto - Top 10 crypto estimated rates for the next hour
/watchlist - Your watchlist estimated rates for the next hour
/back - Return to main menu
";

impl Scene {
    /// The command table reachable while this scene is active.
    pub fn commands(self) -> &'static [(&'static str, CommandKind)] {
        match self {
            Scene::Root => ROOT_COMMANDS,
            Scene::Watchlist => WATCHLIST_COMMANDS,
            Scene::Lending => LENDING_COMMANDS,
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Scene::Root => ROOT_HELP,
            Scene::Watchlist => WATCHLIST_HELP,
            Scene::Lending => LENDING_HELP,
        }
    }

    /// Reply of the `enter` handler.
    pub fn welcome(self) -> Option<String> {
        match self {
            Scene::Root => None,
            Scene::Watchlist => Some(format!("Welcome to watch tower\n {WATCHLIST_HELP}")),
            Scene::Lending => Some(format!("Welcome to lending\n {LENDING_HELP}")),
        }
    }

    /// Reply of the `leave` handler.
    pub fn farewell(self) -> Option<&'static str> {
        match self {
            Scene::Root => None,
            Scene::Watchlist => Some("Leaving watch tower"),
            Scene::Lending => Some("Leaving lending scene"),
        }
    }

    fn lookup(self, name: &str) -> CommandKind {
        self.commands()
            .iter()
            .find(|(command, _)| *command == name)
            .map(|(_, kind)| *kind)
            .unwrap_or(CommandKind::Unknown)
    }
}

/// Result of feeding one command to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Scene,
    pub next: Scene,
    pub kind: CommandKind,
}

impl Transition {
    /// Enter/leave reply when the scene changes.
    pub fn lifecycle_reply(&self) -> Option<String> {
        if self.from == self.next {
            return None;
        }
        match self.next {
            Scene::Root => self.from.farewell().map(String::from),
            scene => scene.welcome(),
        }
    }
}

/// Resolve `command` in the table of `scene` and compute the next scene.
pub fn transition(scene: Scene, command: &str) -> Transition {
    let kind = scene.lookup(command);
    let next = match kind {
        CommandKind::EnterWatchlist => Scene::Watchlist,
        CommandKind::EnterLending => Scene::Lending,
        CommandKind::Back => Scene::Root,
        _ => scene,
    };
    Transition {
        from: scene,
        next,
        kind,
    }
}
