//! Plain-text rendering of command outcomes.

use colored::Colorize;
use dbadmin_core::grammar::{CommandGrammar, Verb};
use dbadmin_core::{Database, Outcome, Shard};
use std::fmt;
use std::io::{self, Write};

pub const DATABASE_HEADERS: [&str; 7] = [
    "Uid",
    "Name",
    "Dns name",
    "IP Address",
    "Port",
    "Shards",
    "Replication",
];

pub const SHARD_HEADERS: [&str; 5] = ["Uid", "DB Uid", "Node Uid", "Assigned Slots", "Role"];

/// Left-aligned columns, a dashed rule under the header.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{cell:<w$}")
                })
                .collect();
            writeln!(f, "{}", padded.join("  ").trim_end())
        };

        line(f, &self.headers)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;
        for row in &self.rows {
            line(f, row)?;
        }
        Ok(())
    }
}

pub fn database_table(databases: &[Database]) -> Table {
    let mut table = Table::new(&DATABASE_HEADERS);
    for db in databases {
        let endpoint = db.primary_endpoint();
        table.push(vec![
            db.uid.to_string(),
            db.name.clone(),
            endpoint.map(|e| e.dns_name.clone()).unwrap_or_default(),
            endpoint
                .and_then(|e| e.addr.first().cloned())
                .unwrap_or_default(),
            endpoint.map(|e| e.port.to_string()).unwrap_or_default(),
            db.shards_count.to_string(),
            if db.replication { "yes" } else { "no" }.to_string(),
        ]);
    }
    table
}

pub fn shard_table(shards: &[Shard]) -> Table {
    let mut table = Table::new(&SHARD_HEADERS);
    for shard in shards {
        table.push(vec![
            shard.uid.clone(),
            shard.bdb_uid.clone(),
            shard.node_uid.clone(),
            shard.assigned_slots.clone(),
            shard.role.clone(),
        ]);
    }
    table
}

pub fn help_text(grammar: &CommandGrammar) -> String {
    let mut out = String::new();
    out.push_str("list [db|shards [<db uid>|<db name>]]\n");
    out.push_str("create <db name> [options]\n");
    out.push_str("change <db uid>|<db name> [options]\n");
    out.push_str("delete <db uid>|<db name>\n");
    out.push_str("quit\n\noptions:\n");
    for spec in grammar.all_flags() {
        let mut notes = Vec::new();
        if !spec.verbs.contains(&Verb::Create) {
            notes.push("change only".to_string());
        }
        if let Some(capability) = spec.gate {
            notes.push(format!("requires {}", capability.describe()));
        }
        if notes.is_empty() {
            out.push_str(&format!("  {}\n", spec.usage));
        } else {
            out.push_str(&format!("  {}  ({})\n", spec.usage, notes.join(", ")));
        }
    }
    out
}

pub fn render(out: &mut impl Write, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Nothing | Outcome::Exit => Ok(()),
        Outcome::Help => write!(out, "{}", help_text(&CommandGrammar::default())),
        Outcome::Overview { databases, shards } => {
            writeln!(out, "{}", "Databases:".bold())?;
            write!(out, "{}", database_table(databases))?;
            writeln!(out)?;
            writeln!(out, "{}", "Shards:".bold())?;
            write!(out, "{}", shard_table(shards))
        }
        Outcome::Databases(databases) => write!(out, "{}", database_table(databases)),
        Outcome::Database(db) => {
            write!(out, "{}", database_table(std::slice::from_ref(db)))?;
            if !db.sync_sources.is_empty() {
                writeln!(out)?;
                writeln!(out, "Replica of:")?;
                for source in &db.sync_sources {
                    writeln!(out, "{}", source.uri)?;
                }
                writeln!(out, "Status: {}", db.sync.as_deref().unwrap_or("unknown"))?;
            }
            Ok(())
        }
        Outcome::Shards(shards) => write!(out, "{}", shard_table(shards)),
        Outcome::Created(db) => {
            writeln!(out, "{} created database {} (uid {})", "OK".green(), db.name, db.uid)?;
            write!(out, "{}", database_table(std::slice::from_ref(db)))
        }
        Outcome::Changed { uid } => writeln!(out, "{} updated database {uid}", "OK".green()),
        Outcome::Deleted { uid } => writeln!(out, "{} deleted database {uid}", "OK".green()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbadmin_core::model::{Endpoint, SyncSource};
    use proptest::prelude::*;

    fn rendered(outcome: &Outcome) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        render(&mut buf, outcome).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sample_db() -> Database {
        Database {
            uid: 3,
            name: "cache".into(),
            shards_count: 2,
            replication: true,
            endpoints: vec![Endpoint {
                dns_name: "redis-12003.c.local".into(),
                addr: vec!["10.0.0.3".into()],
                port: 12003,
            }],
            ..Database::default()
        }
    }

    #[test]
    fn database_table_uses_classic_headers() {
        let text = rendered(&Outcome::Databases(vec![sample_db()]));
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Uid  Name"));
        assert!(header.contains("IP Address"));
        assert!(lines.next().unwrap().starts_with("---"));
        let row = lines.next().unwrap();
        assert!(row.contains("redis-12003.c.local"));
        assert!(row.contains("10.0.0.3"));
        assert!(row.ends_with("yes"));
    }

    #[test]
    fn single_database_lists_replica_sources() {
        let mut db = sample_db();
        db.sync_sources = vec![SyncSource::new("redis://admin:x@a:1")];
        db.sync = Some("paused".into());
        let text = rendered(&Outcome::Database(db));
        assert!(text.contains("Replica of:\nredis://admin:x@a:1\nStatus: paused"));

        let plain = rendered(&Outcome::Database(sample_db()));
        assert!(!plain.contains("Replica of:"));
    }

    #[test]
    fn overview_has_both_sections() {
        let text = rendered(&Outcome::Overview {
            databases: vec![sample_db()],
            shards: Vec::new(),
        });
        assert!(text.starts_with("Databases:\n"));
        assert!(text.contains("\nShards:\nUid  DB Uid  Node Uid  Assigned Slots  Role"));
    }

    #[test]
    fn created_database_is_shown_as_a_table() {
        let text = rendered(&Outcome::Created(sample_db()));
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("OK created database cache (uid 3)"));
        assert!(lines.next().unwrap().starts_with("Uid  Name"));
        assert!(lines.next().unwrap().starts_with("---"));
        assert!(lines.next().unwrap().starts_with("3    cache"));
    }

    #[test]
    fn help_lists_every_option_usage() {
        let grammar = CommandGrammar::default();
        let help = help_text(&grammar);
        for spec in grammar.all_flags() {
            assert!(help.contains(spec.usage), "{}", spec.name);
        }
        assert!(help.contains("(change only)"));
        assert!(help.contains("requires rack awareness"));
    }

    #[test]
    fn missing_endpoint_leaves_cells_blank() {
        let db = Database {
            uid: 9,
            name: "bare".into(),
            ..Database::default()
        };
        let text = database_table(&[db]).to_string();
        assert_eq!(text.lines().count(), 3);
    }

    proptest! {
        #[test]
        fn every_line_fits_the_column_widths(
            cells in proptest::collection::vec("[a-z0-9]{0,12}", 5),
        ) {
            let mut table = Table::new(&SHARD_HEADERS);
            table.push(cells.clone());
            let text = table.to_string();
            let rule_len = text.lines().nth(1).unwrap().len();
            for line in text.lines() {
                prop_assert!(line.len() <= rule_len);
            }
        }
    }
}
