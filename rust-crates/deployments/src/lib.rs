use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const NETWORK_FILE: &str = "network.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Where the game's Move modules are published on one network.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkRecord {
    pub recorded_at: String,
    pub module_address: String,
    pub node_url: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl NetworkRecord {
    pub fn is_for_node(&self, url: &str) -> bool {
        self.node_url.trim_end_matches('/') == url.trim_end_matches('/')
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::at(Path::new(DEPLOYMENTS_ROOT), env)
    }

    pub fn at(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root, env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<NetworkRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &NetworkRecord) -> Result<()> {
        write_record(&self.path, record)
    }

    /// Replaces the stored record with one stamped now.
    pub fn record(
        &self,
        module_address: impl AsRef<str>,
        node_url: impl AsRef<str>,
        chain_id: Option<u64>,
    ) -> Result<NetworkRecord> {
        let record = NetworkRecord {
            recorded_at: Utc::now().to_rfc3339(),
            module_address: module_address.as_ref().to_string(),
            node_url: node_url.as_ref().to_string(),
            chain_id,
        };
        self.save(&record)?;
        Ok(record)
    }
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!(
                "Failed to create {}/{} directory",
                root.display(),
                env.dir_name()
            )
        })?;
    }

    let file_path = env_dir.join(NETWORK_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create network record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize network record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<NetworkRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read network records")?;
    if data.iter().all(u8::is_ascii_whitespace) || data.is_empty() {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<NetworkRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<NetworkRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse network record JSON; expected a single record object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &NetworkRecord) -> Result<()> {
    let json =
        serde_json::to_vec_pretty(record).context("Failed to serialize network record")?;
    fs::write(path.as_ref(), json).context("Failed to write network record")?;
    Ok(())
}

pub fn record_network(
    env: DeploymentEnv,
    module_address: impl AsRef<str>,
    node_url: impl AsRef<str>,
    chain_id: Option<u64>,
) -> Result<NetworkRecord> {
    DeploymentStore::new(env)?.record(module_address, node_url, chain_id)
}
