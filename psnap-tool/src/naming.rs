use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use psnap_lib::SnapshotMode;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::path::{Path, PathBuf};

const DEFAULT_ARCHIVE_NAME: &str = "snapshot_%datetime%.zip";

/// Resolves the configured output into a concrete destination path.
///
/// Placeholders in the final component are expanded. In zip mode an output
/// without a file extension names a directory, and the archive inside it gets
/// a default timestamped name.
pub fn resolve_output(input: &str, mode: SnapshotMode, source: &Path) -> Result<PathBuf> {
    let input_path = Path::new(input);

    let has_extension = input_path
        .extension()
        .map(|ext| !ext.is_empty())
        .unwrap_or(false);

    let (dir, template) = if mode == SnapshotMode::Zip && !has_extension {
        (input_path, DEFAULT_ARCHIVE_NAME.to_string())
    } else {
        let Some(name) = input_path.file_name() else {
            // `.` or `..` as a copy destination
            if mode == SnapshotMode::Copy {
                return Ok(input_path.to_path_buf());
            }
            anyhow::bail!("Invalid file name in output path: {input}");
        };
        (
            input_path.parent().unwrap_or_else(|| Path::new("")),
            name.to_string_lossy().to_string(),
        )
    };

    let pwd = source_name(source);
    let name = expand_placeholders(&template, Utc::now(), &pwd);
    Ok(dir.join(name))
}

/// Name of the source directory, for `%pwd%`.
fn source_name(source: &Path) -> String {
    source
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "unknown".into())
}

fn expand_placeholders(template: &str, now_utc: DateTime<Utc>, pwd: &str) -> String {
    let now_local: DateTime<Local> = now_utc.with_timezone(&Local);

    let replacements = [
        ("%datetime%", now_utc.format("%Y-%m-%d_%H-%M-%S").to_string()),
        ("%date%", now_utc.format("%Y-%m-%d").to_string()),
        ("%time%", now_utc.format("%H-%M-%S").to_string()),
        ("%unix%", now_utc.timestamp().to_string()),
        ("%ltime%", now_local.format("%Y-%m-%d_%H-%M-%S").to_string()),
        ("%rand%", random_string(5)),
        ("%longrand%", random_string(12)),
        ("%pwd%", pwd.to_string()),
    ];

    let mut name = template.to_string();
    for (pattern, value) in replacements {
        name = replace_case_insensitive(&name, pattern, &value);
    }
    name
}

/// Random lowercase alphanumeric suffix for output names.
fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

/// Helper for case-insensitive substring replacement. Patterns are ASCII, so
/// byte offsets in the lowercased string line up with the original.
fn replace_case_insensitive(s: &str, pattern: &str, replacement: &str) -> String {
    let mut result = String::new();
    let lower_s = s.to_ascii_lowercase();
    let lower_pattern = pattern.to_ascii_lowercase();

    let mut last_end = 0;
    let mut search_start = 0;

    while let Some(pos) = lower_s[search_start..].find(&lower_pattern) {
        let abs_pos = search_start + pos;
        result.push_str(&s[last_end..abs_pos]);
        result.push_str(replacement);
        last_end = abs_pos + pattern.len();
        search_start = last_end;
    }

    result.push_str(&s[last_end..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn expands_time_and_pwd_placeholders() {
        let name = expand_placeholders("%PWD%_%Date%_%time%.zip", fixed_now(), "DentOffice");
        assert_eq!(name, "DentOffice_2026-03-09_14-05-07.zip");

        let name = expand_placeholders("backup-%datetime%-%unix%", fixed_now(), "x");
        assert_eq!(name, "backup-2026-03-09_14-05-07-1773065107");
    }

    #[test]
    fn rand_placeholders_have_fixed_length() {
        let name = expand_placeholders("%rand%|%longrand%", fixed_now(), "x");
        let (short, long) = name.split_once('|').unwrap();
        assert_eq!(short.len(), 5);
        assert_eq!(long.len(), 12);
        assert!(name.chars().all(|c| c == '|' || c.is_ascii_alphanumeric()));
        assert!(!name.chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        assert_eq!(
            replace_case_insensitive("Ünïcode_%percent", "%date%", "x"),
            "Ünïcode_%percent"
        );
    }

    #[test]
    fn zip_output_without_extension_is_a_directory() -> Result<()> {
        let source = tempfile::tempdir()?;
        let resolved = resolve_output("out/archives", SnapshotMode::Zip, source.path())?;

        assert_eq!(resolved.parent(), Some(Path::new("out/archives")));
        let name = resolved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("snapshot_") && name.ends_with(".zip"), "{name}");
        Ok(())
    }

    #[test]
    fn copy_output_keeps_its_directory_name() -> Result<()> {
        let source = tempfile::tempdir()?;
        let resolved = resolve_output("/srv/DentOffice", SnapshotMode::Copy, source.path())?;
        assert_eq!(resolved, PathBuf::from("/srv/DentOffice"));

        let resolved = resolve_output("dist/%pwd%.zip", SnapshotMode::Zip, source.path())?;
        let expected = format!("{}.zip", source_name(source.path()));
        assert_eq!(resolved, Path::new("dist").join(expected));
        Ok(())
    }
}
