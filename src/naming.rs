//! Interactive camera naming
//!
//! Each discovered camera is re-opened, previewed briefly and then named by
//! the operator. Names double as output folder names, so the session also
//! creates `<output_root>/<name>/` for every name it hands out. A names file
//! can stand in for the interactive step on later runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::camera::CameraHandle;
use crate::errors::CameraError;
use crate::platform::{CameraBackend, OpenParams};
use crate::preview;
use crate::types::{CameraId, CameraName};
use crate::ui::{Display, Prompt};

/// What happens when the operator gives two cameras the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateNamePolicy {
    /// Refuse the name and ask again.
    #[default]
    Reject,
    /// Accept it with a numeric suffix (`top`, `top_2`, ...).
    Suffix,
    /// Accept it as-is. Both cameras then share an output folder and a
    /// recording start will refuse the colliding file names.
    Allow,
}

/// Interval between preview refreshes while naming.
const PREVIEW_POLL: Duration = Duration::from_millis(30);

pub struct NamingSession<'a> {
    backend: &'a dyn CameraBackend,
    params: OpenParams,
    preview_duration: Duration,
    preview_height: u32,
    policy: DuplicateNamePolicy,
}

impl<'a> NamingSession<'a> {
    pub fn new(backend: &'a dyn CameraBackend, params: OpenParams) -> Self {
        Self {
            backend,
            params,
            preview_duration: Duration::from_secs(3),
            preview_height: 240,
            policy: DuplicateNamePolicy::default(),
        }
    }

    pub fn with_preview_duration(mut self, duration: Duration) -> Self {
        self.preview_duration = duration;
        self
    }

    pub fn with_preview_height(mut self, height: u32) -> Self {
        self.preview_height = height;
        self
    }

    pub fn with_policy(mut self, policy: DuplicateNamePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Preview and name every camera in `ids`.
    ///
    /// Cameras that can't be opened or never show a frame are skipped.
    /// Fails only if the prompt's input stream closes.
    pub fn assign_names<U>(
        &self,
        ids: &BTreeSet<CameraId>,
        ui: &mut U,
    ) -> Result<BTreeMap<CameraId, CameraName>, CameraError>
    where
        U: Display + Prompt + ?Sized,
    {
        let mut names = BTreeMap::new();

        for &id in ids {
            let mut handle = match CameraHandle::open(self.backend, id, &self.params) {
                Ok(handle) => handle,
                Err(e) => {
                    log::warn!("Could not open camera {} for naming: {}", id, e);
                    continue;
                }
            };

            log::info!("Previewing camera {}...", id);
            let shown = self.preview(&mut handle, ui);
            if shown == 0 {
                log::warn!("Could not get preview from camera {}, skipping", id);
                handle.release();
                continue;
            }

            let name = self.ask_name(id, &names, ui);
            handle.release();
            let name = name?;

            log::info!("Camera {} named '{}'", id, name);
            names.insert(id, name);
        }

        Ok(names)
    }

    /// Show live frames for the preview duration; returns how many were shown.
    fn preview<U>(&self, handle: &mut CameraHandle, ui: &mut U) -> u32
    where
        U: Display + ?Sized,
    {
        let id = handle.id();
        let label = format!("Camera {}", id);
        let status = format!("Camera {} - name it when the preview ends", id);
        let started = Instant::now();
        let mut shown = 0u32;

        loop {
            match handle.read() {
                Ok(frame) => {
                    let surface =
                        preview::compose([(id, label.as_str(), &frame)], self.preview_height, false);
                    if let Err(e) = ui.show(surface.as_ref(), &status) {
                        log::debug!("Preview display failed: {}", e);
                    }
                    shown += 1;
                }
                Err(e) => log::debug!("Preview read from camera {} failed: {}", id, e),
            }

            if started.elapsed() >= self.preview_duration {
                break;
            }
            std::thread::sleep(PREVIEW_POLL.min(self.preview_duration));
        }

        shown
    }

    fn ask_name<U>(
        &self,
        id: CameraId,
        taken: &BTreeMap<CameraId, CameraName>,
        ui: &mut U,
    ) -> Result<CameraName, CameraError>
    where
        U: Prompt + ?Sized,
    {
        let question = format!("Enter name for camera {} (e.g., 'front', 'side'): ", id);
        loop {
            let answer = ui.ask(&question)?.ok_or_else(|| {
                CameraError::InvalidInput(format!("input closed while naming camera {}", id))
            })?;

            let name = match CameraName::new(&answer) {
                Ok(name) => name,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };

            match resolve_duplicate(name, taken.values(), self.policy) {
                Some(name) => return Ok(name),
                None => {
                    log::warn!("Name already used by another camera, choose another");
                }
            }
        }
    }
}

/// Apply `policy` to `name` given the names already handed out.
///
/// Returns `None` when the name must be re-prompted.
pub fn resolve_duplicate<'n, I>(
    name: CameraName,
    taken: I,
    policy: DuplicateNamePolicy,
) -> Option<CameraName>
where
    I: IntoIterator<Item = &'n CameraName>,
{
    let taken: BTreeSet<&str> = taken.into_iter().map(|n| n.as_str()).collect();
    if !taken.contains(name.as_str()) {
        return Some(name);
    }

    match policy {
        DuplicateNamePolicy::Reject => None,
        DuplicateNamePolicy::Allow => {
            log::warn!("Camera name '{}' is shared; its trial files will collide", name);
            Some(name)
        }
        DuplicateNamePolicy::Suffix => (2u32..)
            .map(|n| format!("{}_{}", name, n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .and_then(|candidate| CameraName::new(candidate).ok()),
    }
}

/// Create `<root>/<name>/` for every distinct name. Existing folders are fine.
pub fn ensure_output_dirs<'n, I>(root: &Path, names: I) -> Result<Vec<PathBuf>, CameraError>
where
    I: IntoIterator<Item = &'n CameraName>,
{
    let distinct: BTreeSet<&CameraName> = names.into_iter().collect();
    let mut created = Vec::with_capacity(distinct.len());

    for name in distinct {
        let dir = root.join(name.as_str());
        fs::create_dir_all(&dir).map_err(|e| {
            CameraError::IoError(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        created.push(dir);
    }

    Ok(created)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NamesFile {
    #[serde(default)]
    cameras: BTreeMap<String, CameraName>,
}

/// Load an id → name mapping saved by [`save_names`].
///
/// Duplicate names are checked against `policy` the same way interactive
/// naming does; `Reject` turns them into an error here.
pub fn load_names(
    path: &Path,
    policy: DuplicateNamePolicy,
) -> Result<BTreeMap<CameraId, CameraName>, CameraError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        CameraError::ConfigError(format!("Failed to read names file {}: {}", path.display(), e))
    })?;
    let file: NamesFile = toml::from_str(&contents).map_err(|e| {
        CameraError::ConfigError(format!("Failed to parse names file {}: {}", path.display(), e))
    })?;

    let mut names = BTreeMap::new();
    for (key, name) in file.cameras {
        let id: CameraId = key.trim().parse().map_err(|_| {
            CameraError::ConfigError(format!("'{}' is not a camera index", key))
        })?;
        let name = resolve_duplicate(name.clone(), names.values(), policy).ok_or_else(|| {
            CameraError::ConfigError(format!("camera name '{}' is used more than once", name))
        })?;
        names.insert(id, name);
    }

    log::info!("Loaded {} camera name(s) from {:?}", names.len(), path);
    Ok(names)
}

/// Persist an id → name mapping as TOML.
pub fn save_names(path: &Path, names: &BTreeMap<CameraId, CameraName>) -> Result<(), CameraError> {
    let file = NamesFile {
        cameras: names
            .iter()
            .map(|(id, name)| (id.to_string(), name.clone()))
            .collect(),
    };
    let toml_string = toml::to_string_pretty(&file)
        .map_err(|e| CameraError::ConfigError(format!("Failed to serialize names: {}", e)))?;
    fs::write(path, toml_string)?;
    log::info!("Saved camera names to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CameraName {
        CameraName::new(s).unwrap()
    }

    #[test]
    fn test_resolve_duplicate_policies() {
        let taken = [name("top"), name("top_2")];

        assert_eq!(resolve_duplicate(name("side"), &taken, DuplicateNamePolicy::Reject), Some(name("side")));
        assert_eq!(resolve_duplicate(name("top"), &taken, DuplicateNamePolicy::Reject), None);
        assert_eq!(resolve_duplicate(name("top"), &taken, DuplicateNamePolicy::Allow), Some(name("top")));
        assert_eq!(resolve_duplicate(name("top"), &taken, DuplicateNamePolicy::Suffix), Some(name("top_3")));
    }

    #[test]
    fn test_ensure_output_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let names = [name("front"), name("side"), name("front")];

        let first = ensure_output_dirs(dir.path(), &names).unwrap();
        let second = ensure_output_dirs(dir.path(), &names).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(dir.path().join("front").is_dir());
        assert!(dir.path().join("side").is_dir());
    }

    #[test]
    fn test_names_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.toml");
        let mut names = BTreeMap::new();
        names.insert(0, name("front"));
        names.insert(2, name("side"));

        save_names(&path, &names).unwrap();
        let loaded = load_names(&path, DuplicateNamePolicy::Reject).unwrap();
        assert_eq!(loaded, names);
    }

    #[test]
    fn test_names_file_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.toml");
        fs::write(&path, "[cameras]\n0 = \"top\"\n1 = \"top\"\n").unwrap();

        assert!(load_names(&path, DuplicateNamePolicy::Reject).is_err());
        let allowed = load_names(&path, DuplicateNamePolicy::Allow).unwrap();
        assert_eq!(allowed.get(&1), Some(&name("top")));
    }
}
