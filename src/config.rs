// ===============================
// src/config.rs
// ===============================
use clap::Parser;
use dotenvy::dotenv;
use std::env;

/// Which half of the simulation this process runs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Node,
    Agents,
    Monitor,
}

impl Role {
    pub fn parse_one(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "node" | "market" | "coordinator" => Some(Role::Node),
            "agents" | "agent" => Some(Role::Agents),
            "monitor" | "watch" => Some(Role::Monitor),
            _ => None,
        }
    }

    pub fn from_env(key: &str, default_role: Role) -> Role {
        env::var(key)
            .ok()
            .and_then(|s| Role::parse_one(&s))
            .unwrap_or(default_role)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Node => "node",
            Role::Agents => "agents",
            Role::Monitor => "monitor",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stocksim", about = "distributed trading venue simulator")]
struct Cli {
    /// Process role: node | agents | monitor (overrides ROLE env)
    #[arg(long)]
    role: Option<String>,

    /// Number of trading agents to start (agents role, overrides NUM_AGENTS)
    #[arg(long)]
    agents: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct Args {
    pub role: Role,

    // venue node
    pub node_id: String,
    pub node_port: u16,
    pub node_url: String,
    pub metrics_port: u16,
    pub symbols: Vec<String>,

    // failure detection
    pub agent_timeout_ms: i64,
    pub sweep_period_ms: u64,

    // snapshots
    pub max_trades_in_snapshot: usize,

    // agent harness
    pub num_agents: u32,
    pub simulate_failure: bool,
    pub agent_min_delay_ms: u64,
    pub agent_jitter_ms: u64,

    // files
    pub record_file: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

pub fn load() -> Args {
    // Make sure .env is read (RECORD_FILE, SYMBOLS, etc.)
    let _ = dotenv();
    let cli = Cli::parse();

    let role = cli
        .role
        .as_deref()
        .and_then(Role::parse_one)
        .unwrap_or_else(|| Role::from_env("ROLE", Role::Node));

    let node_id = env::var("NODE_ID").unwrap_or_else(|_| "market-node-01".to_string());
    let node_port: u16 = env_parse("NODE_PORT", 8080);
    let node_url = env::var("NODE_URL").unwrap_or_else(|_| format!("http://127.0.0.1:{node_port}"));
    let metrics_port: u16 = env_parse("METRICS_PORT", 9898);

    // SYMBOLS=AAPL,GOOG,TSLA
    let symbols: Vec<String> = env::var("SYMBOLS")
        .ok()
        .map(|s| {
            s.split(',')
                .map(|x| x.trim())
                .filter(|x| !x.is_empty())
                .map(|x| x.to_ascii_uppercase())
                .collect()
        })
        .filter(|v: &Vec<String>| !v.is_empty())
        .unwrap_or_else(|| vec!["AAPL".to_string(), "GOOG".to_string(), "TSLA".to_string()]);

    let agent_timeout_ms: i64 = env_parse("AGENT_TIMEOUT_MILLIS", 10_000);
    let sweep_period_ms: u64 = env_parse("SWEEP_PERIOD_MILLIS", 2_000);
    let max_trades_in_snapshot: usize = env_parse("MAX_TRADES_IN_SNAPSHOT", 50);

    let num_agents = cli.agents.unwrap_or_else(|| env_parse("NUM_AGENTS", 3));
    let simulate_failure: bool = env_parse("SIMULATE_FAILURE", true);
    let agent_min_delay_ms: u64 = env_parse("AGENT_MIN_DELAY_MS", 1_000);
    let agent_jitter_ms: u64 = env_parse("AGENT_JITTER_MS", 2_000);

    let record_file = env::var("RECORD_FILE").ok();

    Args {
        role,
        node_id,
        node_port,
        node_url,
        metrics_port,
        symbols,
        agent_timeout_ms,
        sweep_period_ms,
        max_trades_in_snapshot,
        num_agents,
        simulate_failure,
        agent_min_delay_ms,
        agent_jitter_ms,
        record_file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_aliases() {
        assert_eq!(Role::parse_one("node"), Some(Role::Node));
        assert_eq!(Role::parse_one("COORDINATOR"), Some(Role::Node));
        assert_eq!(Role::parse_one(" agents "), Some(Role::Agents));
        assert_eq!(Role::parse_one("watch"), Some(Role::Monitor));
        assert_eq!(Role::parse_one("ui"), None);
    }
}
