use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    Random,
    RoundRobin,
}

impl std::str::FromStr for RotationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "round_robin" | "round-robin" | "roundrobin" => Ok(Self::RoundRobin),
            other => Err(format!("unknown rotation mode `{}`", other)),
        }
    }
}

/// Fixed set of client identities, one picked per fetch call
#[derive(Debug)]
pub struct UserAgentPool {
    agents: Vec<String>,
    mode: RotationMode,
    cursor: AtomicUsize,
}

impl UserAgentPool {
    /// Caller guarantees `agents` is non-empty (checked by config validation)
    pub fn new(agents: Vec<String>, mode: RotationMode) -> Self {
        Self {
            agents,
            mode,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn pick(&self) -> &str {
        if self.agents.is_empty() {
            return DEFAULT_USER_AGENTS[0];
        }
        let idx = match self.mode {
            RotationMode::Random => rand::thread_rng().gen_range(0..self.agents.len()),
            RotationMode::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len(),
        };
        &self.agents[idx]
    }
}

/// Browser-like headers sent with every index request
pub fn browser_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), user_agent.to_string()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language".to_string(), "tr-TR,tr;q=0.9,en;q=0.8".to_string()),
        ("DNT".to_string(), "1".to_string()),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<String> {
        vec!["ua-a".to_string(), "ua-b".to_string(), "ua-c".to_string()]
    }

    #[test]
    fn round_robin_cycles_through_pool() {
        let pool = UserAgentPool::new(agents(), RotationMode::RoundRobin);
        let picked: Vec<_> = (0..4).map(|_| pool.pick().to_string()).collect();
        assert_eq!(picked, vec!["ua-a", "ua-b", "ua-c", "ua-a"]);
    }

    #[test]
    fn random_stays_inside_pool() {
        let pool = UserAgentPool::new(agents(), RotationMode::Random);
        for _ in 0..50 {
            let picked = pool.pick();
            assert!(agents().iter().any(|a| a == picked));
        }
    }

    #[test]
    fn rotation_mode_parses() {
        assert_eq!("round-robin".parse::<RotationMode>(), Ok(RotationMode::RoundRobin));
        assert_eq!("RANDOM".parse::<RotationMode>(), Ok(RotationMode::Random));
        assert!("sticky".parse::<RotationMode>().is_err());
    }
}
