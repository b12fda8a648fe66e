//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries
//! (domain → application → infra/output → commands) are maintained.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-comment lines outside `#[cfg(test)]` blocks, with their line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            !in_test
                && !trimmed.starts_with("//")
                && !trimmed.starts_with("/*")
                && !trimmed.starts_with('*')
        })
        .map(|(i, line)| (i + 1, line.to_string()))
        .collect()
}

/// Report every production line in `layer` that contains a forbidden pattern.
fn find_forbidden(layer: &str, forbidden: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir(layer)) {
        let rel = relative(&file);
        for (lineno, line) in production_lines(&file) {
            for pattern in forbidden {
                if line.contains(pattern) {
                    violations.push(format!("{rel}:{lineno}: `{pattern}`: {}", line.trim()));
                }
            }
        }
    }
    violations
}

// ── Domain layer ──────────────────────────────────────────────────────────────

#[test]
fn domain_has_no_outer_layer_or_io_imports() {
    let violations = find_forbidden(
        "domain",
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::",
            "reqwest",
            "std::fs",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay pure:\n{}",
        violations.join("\n")
    );
}

// ── Application layer ─────────────────────────────────────────────────────────

#[test]
fn application_has_no_infra_or_output_imports() {
    let violations = find_forbidden(
        "application",
        &[
            "crate::infra",
            "crate::output",
            "crate::commands",
            "reqwest",
        ],
    );
    assert!(
        violations.is_empty(),
        "application/ must not import from infra/, output/ or commands/:\n{}",
        violations.join("\n")
    );
}

/// Services take `&impl PlatformGateway`, never the concrete HTTP adapter.
#[test]
fn services_do_not_name_the_concrete_gateway() {
    let violations = find_forbidden("application", &["ProxmoxGateway", "YamlConfigStore"]);
    assert!(
        violations.is_empty(),
        "Service signatures must use port traits:\n{}",
        violations.join("\n")
    );
}

// ── Infra layer ───────────────────────────────────────────────────────────────

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = find_forbidden("infra", &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = find_forbidden("infra", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

// ── Command handlers ──────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations = find_forbidden("commands", &["json: bool"]);
    for file in collect_rs_files(&src_dir("commands")) {
        let rel = relative(&file);
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            if trimmed.starts_with("if json") || trimmed.starts_with("if !json") {
                violations.push(format!("{rel}:{lineno}: found inline JSON branch: {trimmed}"));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "Found inline JSON branching in commands/ — use app.renderer() instead:\n{}",
        violations.join("\n")
    );
}

#[test]
fn command_handlers_accept_app_context() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        if content.contains("pub async fn run(") && !content.contains("app: &AppContext") {
            violations.push(relative(&file));
        }
    }
    assert!(
        violations.is_empty(),
        "Command handlers must accept &AppContext:\n{}",
        violations.join("\n")
    );
}

/// Each file in `commands/` stays a thin shell around a service.
#[test]
fn command_handlers_are_reasonably_sized() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir("commands")) {
        let count = production_lines(&file)
            .iter()
            .filter(|(_, l)| !l.trim().is_empty())
            .count();
        if count > 125 {
            violations.push(format!("{}: {count} non-test lines (limit: 125)", relative(&file)));
        }
    }
    assert!(
        violations.is_empty(),
        "Command handler files exceed 125-line limit — extract logic to application services:\n{}",
        violations.join("\n")
    );
}

#[test]
fn no_module_level_dead_code_allows_in_layers() {
    let mut violations = Vec::new();
    for layer in ["domain", "application", "infra", "commands", "output"] {
        violations.extend(find_forbidden(layer, &["#![allow(dead_code)]"]));
    }
    assert!(
        violations.is_empty(),
        "Remove module-level dead_code allows:\n{}",
        violations.join("\n")
    );
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Every field of the stylesheet is applied somewhere outside `styles.rs`.
#[test]
fn every_style_field_is_used() {
    let styles_file = src_dir("output").join("styles.rs");
    let fields: Vec<String> = production_lines(&styles_file)
        .iter()
        .filter_map(|(_, line)| {
            let field = line.trim().strip_prefix("pub ")?.strip_suffix(": Style,")?;
            Some(field.to_string())
        })
        .collect();
    assert!(!fields.is_empty(), "no Style fields found in {}", relative(&styles_file));

    let mut uses = String::new();
    for layer in ["output", "commands"] {
        for file in collect_rs_files(&src_dir(layer)) {
            if file == styles_file {
                continue;
            }
            for (_, line) in production_lines(&file) {
                uses.push_str(&line);
                uses.push('\n');
            }
        }
    }
    let unused: Vec<&String> = fields
        .iter()
        .filter(|f| !uses.contains(&format!("styles.{f})")))
        .collect();
    assert!(
        unused.is_empty(),
        "Style fields never applied outside styles.rs: {unused:?}"
    );
}
