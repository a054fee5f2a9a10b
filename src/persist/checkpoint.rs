use std::path::PathBuf;

use log::debug;

use crate::error::Result;
use crate::network::network::SegNet;

/// Receives a snapshot of the model under a caller-chosen name.
pub trait CheckpointSink {
    fn save(&mut self, name: &str, net: &SegNet) -> Result<()>;
}

/// Writes `<dir>/<name>.json` with `SegNet::save_json`.
///
/// The directory is used as given; if it does not exist the save fails with
/// an I/O error.
#[derive(Debug, Clone)]
pub struct JsonCheckpoints {
    dir: PathBuf,
}

impl JsonCheckpoints {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonCheckpoints { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn load(&self, name: &str) -> Result<SegNet> {
        SegNet::load_json(self.path_for(name))
    }
}

impl CheckpointSink for JsonCheckpoints {
    fn save(&mut self, name: &str, net: &SegNet) -> Result<()> {
        let path = self.path_for(name);
        net.save_json(&path)?;
        debug!("checkpoint written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegError;
    use crate::network::spec::NetSpec;

    #[test]
    fn save_then_load_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonCheckpoints::new(dir.path());
        let net = SegNet::new(NetSpec::default(), 1).unwrap();
        sink.save("log_epoch_0", &net).unwrap();
        assert!(dir.path().join("log_epoch_0.json").exists());
        let back = sink.load("log_epoch_0").unwrap();
        assert_eq!(back.layers.len(), net.layers.len());
    }

    #[test]
    fn missing_directory_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonCheckpoints::new(dir.path().join("absent"));
        let net = SegNet::new(NetSpec::default(), 1).unwrap();
        assert!(matches!(sink.save("x", &net), Err(SegError::Io(_))));
    }
}
