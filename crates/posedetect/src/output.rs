use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::export::ExportFormat;

/// Timestamped destinations for one run, derived once at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub output_dir: PathBuf,
    pub json_file: PathBuf,
    pub csv_file: PathBuf,
    pub frames_dir: PathBuf,
    pub overlay_dir: PathBuf,
}

impl OutputPaths {
    /// `pose_<stem>_<YYYYMMDD_HHMMSS>.{json,csv}` plus `frames_<stem>_<ts>/`
    /// and `overlay_<stem>_<ts>/` under `output_dir`. Custom file names
    /// replace the generated JSON/CSV names.
    pub fn derive<Tz: TimeZone>(
        output_dir: &Path,
        input: &Path,
        json_name: Option<&str>,
        csv_name: Option<&str>,
        now: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let stem = input_stem(input);
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let file = |custom: Option<&str>, ext: &str| {
            output_dir.join(
                custom
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("pose_{stem}_{stamp}.{ext}")),
            )
        };

        Self {
            output_dir: output_dir.to_path_buf(),
            json_file: file(json_name, "json"),
            csv_file: file(csv_name, "csv"),
            frames_dir: output_dir.join(format!("frames_{stem}_{stamp}")),
            overlay_dir: output_dir.join(format!("overlay_{stem}_{stamp}")),
        }
    }

    pub fn export_path(&self, format: ExportFormat) -> &Path {
        match format {
            ExportFormat::Json => &self.json_file,
            ExportFormat::Csv => &self.csv_file,
        }
    }

    /// Create the output directory, export parents and the enabled artifact
    /// directories. Returns the offending path on failure.
    pub fn create_dirs(&self, frames: bool, overlays: bool) -> Result<(), (PathBuf, io::Error)> {
        let mut dirs = vec![self.output_dir.clone()];
        for file in [&self.json_file, &self.csv_file] {
            if let Some(parent) = file.parent() {
                dirs.push(parent.to_path_buf());
            }
        }
        if frames {
            dirs.push(self.frames_dir.clone());
        }
        if overlays {
            dirs.push(self.overlay_dir.clone());
        }

        for dir in dirs {
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(&dir).map_err(|err| (dir.clone(), err))?;
        }
        Ok(())
    }

    /// Confirm every selected export destination can be written before any
    /// frame is processed: the path must not be a directory and its parent
    /// must accept new files.
    pub fn check_writable(&self, formats: &[ExportFormat]) -> Result<(), (PathBuf, io::Error)> {
        for &format in formats {
            let path = self.export_path(format);
            if path.is_dir() {
                return Err((
                    path.to_path_buf(),
                    io::Error::new(
                        io::ErrorKind::IsADirectory,
                        "export destination is a directory",
                    ),
                ));
            }
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            NamedTempFile::new_in(parent).map_err(|err| (parent.to_path_buf(), err))?;
        }
        Ok(())
    }

    /// Remove artifact directories that ended up empty.
    pub fn remove_empty_dirs(&self) {
        for dir in [&self.frames_dir, &self.overlay_dir] {
            let empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty && fs::remove_dir(dir).is_ok() {
                debug!(dir = %dir.display(), "removed empty artifact directory");
            }
        }
    }
}

fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty() && stem != "." && stem != "..")
        .unwrap_or_else(|| "input".to_string())
}
