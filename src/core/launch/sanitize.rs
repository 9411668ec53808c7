//! Keeps only the newest ASM jar per artifact on a launch classpath.
//!
//! Loader stacks sometimes pull several `org.ow2.asm` versions onto one
//! classpath, and the JVM then fails at startup with incompatible class
//! versions. Everything here is best-effort: a parse failure leaves the
//! command untouched.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use super::classpath::classpath_separator;
use crate::core::error::{LauncherError, LauncherResult};

const ASM_MARKER: &str = "org/ow2/asm/";

fn compile(pattern: &str) -> LauncherResult<Regex> {
    Regex::new(pattern).map_err(|e| LauncherError::Sanitize(e.to_string()))
}

fn asm_entry_pattern() -> LauncherResult<Regex> {
    compile(r"org/ow2/asm/([^/]+)/(\d+)\.(\d+)(?:\.(\d+))?/")
}

fn version_dir_pattern() -> LauncherResult<Regex> {
    compile(r"^(\d+)\.(\d+)(?:\.(\d+))?$")
}

type AsmVersion = (u32, u32, u32);

fn parse_number(raw: Option<regex::Match<'_>>) -> LauncherResult<u32> {
    match raw {
        None => Ok(0),
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| LauncherError::Sanitize(format!("version part {:?} out of range", m.as_str()))),
    }
}

/// Artifact name and version of an ASM jar path, `None` for any other path.
/// A path under the ASM group whose version cannot be read is an error.
fn asm_coordinates(pattern: &Regex, entry: &str) -> LauncherResult<Option<(String, AsmVersion)>> {
    let normalized = entry.replace('\\', "/");
    if !normalized.contains(ASM_MARKER) {
        return Ok(None);
    }
    let captures = pattern
        .captures(&normalized)
        .ok_or_else(|| LauncherError::Sanitize(format!("unrecognized ASM entry {:?}", entry)))?;
    let version = (
        parse_number(captures.get(2))?,
        parse_number(captures.get(3))?,
        parse_number(captures.get(4))?,
    );
    Ok(Some((captures[1].to_string(), version)))
}

/// Drop every ASM entry older than the newest one of the same artifact.
/// Other entries keep their relative order.
pub fn sanitize_classpath(classpath: &str, separator: &str) -> LauncherResult<String> {
    let pattern = asm_entry_pattern()?;
    let entries: Vec<&str> = classpath.split(separator).collect();

    let mut parsed = Vec::with_capacity(entries.len());
    let mut newest: HashMap<String, AsmVersion> = HashMap::new();
    for entry in &entries {
        let coords = asm_coordinates(&pattern, entry)?;
        if let Some((artifact, version)) = &coords {
            let best = newest.entry(artifact.clone()).or_insert(*version);
            if *version > *best {
                *best = *version;
            }
        }
        parsed.push(coords);
    }

    let mut kept_versions: HashMap<String, bool> = HashMap::new();
    let mut kept = Vec::with_capacity(entries.len());
    for (entry, coords) in entries.iter().zip(parsed) {
        match coords {
            None => kept.push(*entry),
            Some((artifact, version)) => {
                let is_newest = newest.get(&artifact) == Some(&version);
                let already_kept = kept_versions.get(&artifact).copied().unwrap_or(false);
                if is_newest && !already_kept {
                    kept_versions.insert(artifact, true);
                    kept.push(*entry);
                } else {
                    debug!("Dropping superseded ASM entry {}", entry);
                }
            }
        }
    }

    Ok(kept.join(separator))
}

/// Sanitize the classpath of a launch command, inline (`-cp`/`-classpath`)
/// or inside an `@argfile`. Returns `command` unchanged on any failure.
pub fn sanitize_command(command: &[String]) -> Vec<String> {
    match try_sanitize_command(command) {
        Ok(sanitized) => sanitized,
        Err(e) => {
            warn!("Classpath sanitation skipped: {}", e);
            command.to_vec()
        }
    }
}

fn try_sanitize_command(command: &[String]) -> LauncherResult<Vec<String>> {
    let separator = classpath_separator();
    let mut out = command.to_vec();

    if let Some(flag) = out.iter().position(|a| a == "-cp" || a == "-classpath") {
        let value = out.get(flag + 1).ok_or_else(|| {
            LauncherError::Sanitize("classpath option has no value".into())
        })?;
        let sanitized = sanitize_classpath(value, separator)?;
        out[flag + 1] = sanitized;
        return Ok(out);
    }

    if let Some(argfile) = out.iter().find_map(|a| a.strip_prefix('@')) {
        sanitize_argfile(Path::new(argfile), separator)?;
    }
    Ok(out)
}

/// Rewrite the classpath line of a Java argument file in place. The file is
/// only written once the new content is fully computed.
fn sanitize_argfile(path: &Path, separator: &str) -> LauncherResult<()> {
    let raw = std::fs::read_to_string(path).map_err(|e| LauncherError::io(path, e))?;
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();

    let mut changed = false;
    let mut value_next = false;
    for line in lines.iter_mut() {
        let trimmed = line.trim();
        if value_next {
            let (value, quoted) = unquote(trimmed);
            let sanitized = sanitize_classpath(value, separator)?;
            changed |= sanitized != value;
            *line = requote(sanitized, quoted);
            break;
        }
        if trimmed == "-cp" || trimmed == "-classpath" {
            value_next = true;
            continue;
        }
        let inline = trimmed
            .strip_prefix("-cp ")
            .or_else(|| trimmed.strip_prefix("-classpath "));
        if let Some(value) = inline {
            let flag = if trimmed.starts_with("-cp ") { "-cp" } else { "-classpath" };
            let (value, quoted) = unquote(value.trim());
            let sanitized = sanitize_classpath(value, separator)?;
            changed |= sanitized != value;
            *line = format!("{} {}", flag, requote(sanitized, quoted));
            break;
        }
    }

    if changed {
        let mut content = lines.join("\n");
        if raw.ends_with('\n') {
            content.push('\n');
        }
        std::fs::write(path, content).map_err(|e| LauncherError::io(path, e))?;
        info!("Rewrote classpath in argument file {:?}", path);
    }
    Ok(())
}

/// Strip surrounding double quotes, reporting whether there were any.
fn unquote(value: &str) -> (&str, bool) {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => (inner, true),
        None => (value, false),
    }
}

// Argument files split on whitespace, so a quoted value must stay quoted.
fn requote(value: String, quoted: bool) -> String {
    if quoted {
        format!("\"{}\"", value)
    } else {
        value
    }
}

/// Remove superseded ASM version directories from the shared library store,
/// keeping the newest per artifact. Returns how many directories were removed.
pub fn prune_library_store(libraries_dir: &Path) -> LauncherResult<usize> {
    let asm_root = libraries_dir.join("org").join("ow2").join("asm");
    if !asm_root.is_dir() {
        return Ok(0);
    }

    let pattern = version_dir_pattern()?;
    let mut removed = 0;
    let artifacts = std::fs::read_dir(&asm_root).map_err(|e| LauncherError::io(&asm_root, e))?;
    for artifact in artifacts.flatten() {
        let artifact_dir = artifact.path();
        if !artifact_dir.is_dir() {
            continue;
        }

        let mut versions: Vec<(AsmVersion, std::path::PathBuf)> = Vec::new();
        let entries =
            std::fs::read_dir(&artifact_dir).map_err(|e| LauncherError::io(&artifact_dir, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(captures) = pattern.captures(&name) else {
                continue;
            };
            let version = (
                parse_number(captures.get(1))?,
                parse_number(captures.get(2))?,
                parse_number(captures.get(3))?,
            );
            versions.push((version, path));
        }

        let Some(newest) = versions.iter().map(|(v, _)| *v).max() else {
            continue;
        };
        for (version, path) in versions {
            if version == newest {
                continue;
            }
            std::fs::remove_dir_all(&path).map_err(|e| LauncherError::io(&path, e))?;
            debug!("Pruned stale library directory {:?}", path);
            removed += 1;
        }
    }

    if removed > 0 {
        info!("Pruned {} superseded ASM directories", removed);
    }
    Ok(removed)
}
