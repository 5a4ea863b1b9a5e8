//! Operator console commands.
//!
//! A command line has the shape `<command> <map> [pool]`, for example
//! `dump 530 4021` or `list 0`. Parsing is separate from execution so a
//! command can be logged or forwarded before it touches any registry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use mappool_core::host::MapHost;
use mappool_core::ids::{MapId, PoolId};
use mappool_core::registry::PoolRegistry;

use crate::report::{dump_pool, list_roots, PoolDump, PoolSummary};
use crate::ConsoleError;

// ---------------------------------------------------------------------------
// MapDirectory
// ---------------------------------------------------------------------------

/// Anything that can hand out the registry of a map by id.
pub trait MapDirectory {
    type Host: MapHost;

    fn registry(&self, map: MapId) -> Option<&PoolRegistry<Self::Host>>;

    fn registry_mut(&mut self, map: MapId) -> Option<&mut PoolRegistry<Self::Host>>;
}

impl<H: MapHost> MapDirectory for BTreeMap<MapId, PoolRegistry<H>> {
    type Host = H;

    fn registry(&self, map: MapId) -> Option<&PoolRegistry<H>> {
        self.get(&map)
    }

    fn registry_mut(&mut self, map: MapId) -> Option<&mut PoolRegistry<H>> {
        self.get_mut(&map)
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    List { map: MapId },
    Dump { map: MapId, pool: PoolId },
    Respawn { map: MapId, pool: PoolId },
    Despawn { map: MapId, pool: PoolId },
    Reseed { map: MapId, pool: PoolId },
    Activate { map: MapId, pool: PoolId },
    Deactivate { map: MapId, pool: PoolId },
}

impl Command {
    pub fn map(&self) -> MapId {
        match *self {
            Command::List { map }
            | Command::Dump { map, .. }
            | Command::Respawn { map, .. }
            | Command::Despawn { map, .. }
            | Command::Reseed { map, .. }
            | Command::Activate { map, .. }
            | Command::Deactivate { map, .. } => map,
        }
    }
}

fn number<T: FromStr>(command: &'static str, what: &str, raw: Option<&str>) -> Result<T, ConsoleError> {
    let raw = raw.ok_or_else(|| ConsoleError::MalformedArguments {
        command,
        reason: format!("missing {what}"),
    })?;
    raw.parse().map_err(|_| ConsoleError::MalformedArguments {
        command,
        reason: format!("{what} {raw:?} is not a number"),
    })
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| ConsoleError::UnknownCommand(String::new()))?
            .to_ascii_lowercase();

        let command: &'static str = match name.as_str() {
            "list" => "list",
            "dump" => "dump",
            "respawn" => "respawn",
            "despawn" => "despawn",
            "reseed" => "reseed",
            "activate" => "activate",
            "deactivate" => "deactivate",
            _ => return Err(ConsoleError::UnknownCommand(name)),
        };

        let map = MapId(number(command, "map id", words.next())?);
        let parsed = if command == "list" {
            Command::List { map }
        } else {
            let pool = PoolId(number(command, "pool id", words.next())?);
            match command {
                "dump" => Command::Dump { map, pool },
                "respawn" => Command::Respawn { map, pool },
                "despawn" => Command::Despawn { map, pool },
                "reseed" => Command::Reseed { map, pool },
                "activate" => Command::Activate { map, pool },
                _ => Command::Deactivate { map, pool },
            }
        };

        if let Some(extra) = words.next() {
            return Err(ConsoleError::MalformedArguments {
                command,
                reason: format!("unexpected argument {extra:?}"),
            });
        }
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Result of a console command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsoleOutput {
    Roots { pools: Vec<PoolSummary> },
    Dump { dump: PoolDump },
    /// A mutating command and the number of entities it affected.
    Changed { action: String, pool: PoolId, count: u32 },
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleOutput::Roots { pools } if pools.is_empty() => writeln!(f, "no pools"),
            ConsoleOutput::Roots { pools } => pools.iter().try_for_each(|p| writeln!(f, "{p}")),
            ConsoleOutput::Dump { dump } => write!(f, "{dump}"),
            ConsoleOutput::Changed { action, pool, count } => writeln!(f, "{action} {pool}: {count}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `command` against the registry of its map.
pub fn execute<D: MapDirectory>(directory: &mut D, command: Command) -> Result<ConsoleOutput, ConsoleError> {
    let map = command.map();
    let registry = directory.registry_mut(map).ok_or(ConsoleError::UnknownMap(map))?;

    let (action, pool, count) = match command {
        Command::List { .. } => {
            return Ok(ConsoleOutput::Roots {
                pools: list_roots(registry),
            });
        }
        Command::Dump { pool, .. } => {
            return Ok(ConsoleOutput::Dump {
                dump: dump_pool(registry, pool)?,
            });
        }
        Command::Respawn { pool, .. } => {
            registry.require_pool(pool)?;
            ("respawned", pool, registry.respawn_pool(pool))
        }
        Command::Despawn { pool, .. } => {
            registry.require_pool(pool)?;
            ("despawned", pool, registry.despawn_pool(pool, true))
        }
        Command::Reseed { pool, .. } => {
            registry.require_pool(pool)?;
            ("reseeded", pool, registry.reseed_pool(pool))
        }
        Command::Activate { pool, .. } => {
            let count = registry.set_active(pool, true).ok_or(mappool_core::PoolError::UnknownPool(pool))?;
            ("activated", pool, count)
        }
        Command::Deactivate { pool, .. } => {
            let count = registry.set_active(pool, false).ok_or(mappool_core::PoolError::UnknownPool(pool))?;
            ("deactivated", pool, count)
        }
    };

    info!(map = %map, pool = %pool, action, count, "console command");
    Ok(ConsoleOutput::Changed {
        action: action.to_owned(),
        pool,
        count,
    })
}

/// Parse and run one console line.
pub fn execute_line<D: MapDirectory>(directory: &mut D, line: &str) -> Result<ConsoleOutput, ConsoleError> {
    execute(directory, line.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pool_commands() {
        let cmd: Command = "dump 530 12".parse().unwrap();
        assert_eq!(cmd, Command::Dump { map: MapId(530), pool: PoolId(12) });
        let cmd: Command = "  RESEED 0   7 ".parse().unwrap();
        assert_eq!(cmd, Command::Reseed { map: MapId(0), pool: PoolId(7) });
        assert_eq!("list 1".parse::<Command>().unwrap(), Command::List { map: MapId(1) });
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!("".parse::<Command>(), Err(ConsoleError::UnknownCommand(_))));
        assert!(matches!("explode 0 1".parse::<Command>(), Err(ConsoleError::UnknownCommand(name)) if name == "explode"));
        assert!(matches!(
            "dump 0".parse::<Command>(),
            Err(ConsoleError::MalformedArguments { command: "dump", .. })
        ));
        assert!(matches!(
            "respawn zero 1".parse::<Command>(),
            Err(ConsoleError::MalformedArguments { command: "respawn", .. })
        ));
        assert!(matches!(
            "list 0 9".parse::<Command>(),
            Err(ConsoleError::MalformedArguments { command: "list", .. })
        ));
    }
}
