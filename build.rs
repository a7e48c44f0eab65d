use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Only the crate's own sources are policed. Anything else under the package
// directory (vendored reference material, target/) is left alone.
const SOURCE_ROOTS: [&str; 3] = ["varmix", "tests", "benches"];

/// One source policy: a line regex plus a filter that decides whether a matched
/// line really violates the policy.
struct Rule {
    pattern: &'static str,
    accept: fn(&str) -> bool,
    include_build_script: bool,
    explanation: &'static str,
}

// Collects the violating lines of a single file for a single rule.
struct ViolationCollector {
    violations: Vec<String>,
    accept: fn(&str) -> bool,
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.accept)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_doc_comment(line: &str) -> bool {
    line.trim_start().starts_with("///")
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("///") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(rest.trim());
    }
    let start = line.find("/*")? + 2;
    match line[start..].find("*/") {
        Some(end) => Some(line[start..start + end].trim()),
        None => Some(line[start..].trim()),
    }
}

// An underscore-prefixed identifier in code, not in a comment or string literal.
fn underscore_in_code(line: &str) -> bool {
    let is_comment = line.trim_start().starts_with("//") || line.contains("/*");
    let in_string = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !is_comment && !in_string
}

// Matched lines are never empty, so every match counts.
fn any_line(line: &str) -> bool {
    !line.is_empty()
}

fn stars_outside_doc_comment(line: &str) -> bool {
    !is_doc_comment(line)
}

fn all_caps_comment(line: &str) -> bool {
    let Some(text) = comment_text(line) else {
        return false;
    };
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}

const RULES: [Rule; 5] = [
    Rule {
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        accept: underscore_in_code,
        include_build_script: true,
        explanation: "Underscore-prefixed variable names are not allowed. Use the variable or remove it.",
    },
    Rule {
        pattern: r"(//|/\*|///).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        accept: any_line,
        include_build_script: false,
        explanation: "Comments narrating edits (FIX, NEW, CHANGE, MODIFY, UPDATE and their forms) are forbidden.",
    },
    Rule {
        pattern: r"(//|/\*).*\*\*",
        accept: stars_outside_doc_comment,
        include_build_script: false,
        explanation: "The '**' pattern is only allowed in doc comments.",
    },
    Rule {
        pattern: r"(//|/\*|///).*",
        accept: all_caps_comment,
        include_build_script: false,
        explanation: "Comments whose letters are all uppercase are forbidden.",
    },
    Rule {
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        accept: any_line,
        include_build_script: false,
        explanation: "#[allow(dead_code)] is forbidden. Use the code or remove it.",
    },
];

fn source_files(include_build_script: bool) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    if include_build_script {
        files.push(PathBuf::from("build.rs"));
    }
    files
}

fn check_rule(rule: &Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();

    for path in source_files(rule.include_build_script) {
        let mut collector = ViolationCollector {
            violations: Vec::new(),
            accept: rule.accept,
        };
        searcher.search_path(&matcher, &path, &mut collector)?;
        if !collector.violations.is_empty() {
            return Err(format_violations(&path, &collector.violations, rule.explanation).into());
        }
    }
    Ok(())
}

fn format_violations(path: &Path, violations: &[String], explanation: &str) -> String {
    let mut message = format!(
        "\n❌ ERROR: Found {} source policy violations in {}:\n",
        violations.len(),
        path.display()
    );
    for violation in violations {
        message.push_str(&format!("   {violation}\n"));
    }
    message.push_str(&format!("\n⚠️ {explanation}\n"));
    message
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    for rule in RULES.iter() {
        if let Err(e) = check_rule(rule) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
