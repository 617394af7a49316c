use crate::error::{OakError, Result};
use crate::state::StateLedger;
use crate::{io, paths, templates};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const PROMPT_RECOMMENDATIONS: &str = "chat.promptFilesRecommendations";
const TERMINAL_AUTO_APPROVE: &str = "chat.tools.terminal.autoApprove";

pub const IDES: &[(&str, &str)] = &[
    ("vscode", paths::VSCODE_SETTINGS_FILE),
    ("cursor", paths::CURSOR_SETTINGS_FILE),
];

pub fn ide_names() -> Vec<&'static str> {
    IDES.iter().map(|(name, _)| *name).collect()
}

/// Merges oak's chat settings into IDE `settings.json` files without
/// disturbing anything the user set.
#[derive(Debug, Clone)]
pub struct IdeSettingsService {
    root: PathBuf,
    ledger: StateLedger,
}

impl IdeSettingsService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ledger: StateLedger::new(root),
        }
    }

    pub fn settings_path(&self, ide: &str) -> Result<PathBuf> {
        IDES.iter()
            .find(|(name, _)| *name == ide)
            .map(|(_, rel)| self.root.join(rel))
            .ok_or_else(|| OakError::UnknownIde(ide.to_string()))
    }

    fn template(&self, ide: &str) -> Result<Value> {
        let (_, body) =
            templates::ide_template(ide).ok_or_else(|| OakError::UnknownIde(ide.to_string()))?;
        Ok(serde_json::from_str(body)?)
    }

    fn read_settings(&self, path: &Path) -> Result<Option<Value>> {
        let Some(data) = io::read_optional(path)? else {
            return Ok(None);
        };
        if data.trim().is_empty() {
            return Ok(Some(Value::Object(Map::new())));
        }
        let value: Value = serde_json::from_str(&data)?;
        if !value.is_object() {
            return Err(OakError::InvalidValue {
                field: paths::relative_to(&self.root, path),
                reason: "settings file is not a JSON object".to_string(),
            });
        }
        Ok(Some(value))
    }

    fn write_settings(&self, path: &Path, value: &Value) -> Result<String> {
        let mut body = serde_json::to_string_pretty(value)?;
        body.push('\n');
        io::atomic_write(path, body.as_bytes())?;
        Ok(body)
    }

    /// Settings after merging the template into `existing`.
    fn merged(&self, ide: &str, existing: Option<&Value>) -> Result<Value> {
        let template = self.template(ide)?;
        let mut merged = existing
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        merge_missing(&mut merged, &template);
        remove_orphaned_commands(&mut merged, &template);
        Ok(merged)
    }

    /// Copy every IDE template into `.oak/ide/`. Returns the number written.
    pub fn install_core_assets(&self) -> Result<usize> {
        let dir = paths::ide_assets_dir(&self.root);
        io::ensure_dir(&dir)?;
        let mut written = 0;
        for (ide, _) in IDES {
            if let Some((file, body)) = templates::ide_template(ide) {
                io::atomic_write(&dir.join(file), body.as_bytes())?;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Merge oak's keys into the IDE's settings file. Existing user values
    /// win; oak command entries no longer shipped are dropped. Returns true
    /// when the file changed.
    pub fn install_settings(&self, ide: &str) -> Result<bool> {
        let path = self.settings_path(ide)?;
        let existing = self.read_settings(&path)?;
        let merged = self.merged(ide, existing.as_ref())?;
        if existing.as_ref() == Some(&merged) {
            return Ok(false);
        }
        let body = self.write_settings(&path, &merged)?;
        if existing.is_none() {
            self.ledger.record_created_file(&path, &body)?;
        }
        Ok(true)
    }

    pub fn needs_upgrade(&self, ide: &str) -> Result<bool> {
        let path = self.settings_path(ide)?;
        let Some(existing) = self.read_settings(&path)? else {
            return Ok(true);
        };
        Ok(self.merged(ide, Some(&existing))? != existing)
    }

    /// Strip oak's keys from the IDE's settings file. Sections left empty are
    /// dropped, and an empty file is deleted along with empty parent folders.
    /// Returns true when anything changed.
    pub fn remove_settings(&self, ide: &str) -> Result<bool> {
        let path = self.settings_path(ide)?;
        let Some(mut settings) = self.read_settings(&path)? else {
            return Ok(false);
        };
        let before = settings.clone();
        if let Some(obj) = settings.as_object_mut() {
            strip_section(obj, PROMPT_RECOMMENDATIONS, |k| k.starts_with("oak."));
            strip_section(obj, TERMINAL_AUTO_APPROVE, |k| k == "oak");
        }
        if settings == before {
            return Ok(false);
        }
        if settings.as_object().is_some_and(Map::is_empty) {
            io::remove_file_if_exists(&path)?;
            if let Some(parent) = path.parent() {
                io::prune_empty_dirs(parent, &self.root)?;
            }
        } else {
            self.write_settings(&path, &settings)?;
        }
        Ok(true)
    }
}

/// Add keys from `template` that `target` lacks, recursing into objects.
fn merge_missing(target: &mut Value, template: &Value) {
    let (Some(target), Some(template)) = (target.as_object_mut(), template.as_object()) else {
        return;
    };
    for (key, value) in template {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_missing(existing, value);
            }
            Some(_) => {}
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Drop `oak.*` prompt recommendations the template no longer lists.
fn remove_orphaned_commands(target: &mut Value, template: &Value) {
    let shipped = template
        .get(PROMPT_RECOMMENDATIONS)
        .and_then(Value::as_object);
    let Some(section) = target
        .get_mut(PROMPT_RECOMMENDATIONS)
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    section.retain(|key, _| {
        !key.starts_with("oak.") || shipped.is_some_and(|s| s.contains_key(key))
    });
}

fn strip_section(obj: &mut Map<String, Value>, section: &str, is_oak: impl Fn(&str) -> bool) {
    let Some(inner) = obj.get_mut(section).and_then(Value::as_object_mut) else {
        return;
    };
    inner.retain(|key, _| !is_oak(key));
    if inner.is_empty() {
        obj.remove(section);
    }
}
