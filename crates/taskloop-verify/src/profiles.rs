use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskloop_tools::SKIPPED_DIRS;
use walkdir::WalkDir;

/// Depth limit for descriptor discovery. Deeper manifests are vendored or
/// fixture code in practice.
const MAX_DISCOVERY_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    Cargo,
    Npm,
    Dotnet,
    Go,
    Python,
    Make,
}

impl BuildSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::Cargo => "cargo",
            BuildSystem::Npm => "npm",
            BuildSystem::Dotnet => "dotnet",
            BuildSystem::Go => "go",
            BuildSystem::Python => "python",
            BuildSystem::Make => "make",
        }
    }

    /// Which build system a file name describes, if any.
    pub fn from_descriptor(file_name: &str) -> Option<Self> {
        match file_name {
            "Cargo.toml" => Some(BuildSystem::Cargo),
            "package.json" => Some(BuildSystem::Npm),
            "go.mod" => Some(BuildSystem::Go),
            "pyproject.toml" | "setup.py" => Some(BuildSystem::Python),
            "Makefile" | "makefile" => Some(BuildSystem::Make),
            _ if file_name.ends_with(".csproj") || file_name.ends_with(".sln") => {
                Some(BuildSystem::Dotnet)
            }
            _ => None,
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Build,
    Lint,
    Test,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Build => "build",
            CheckKind::Lint => "lint",
            CheckKind::Test => "test",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A project manifest found in the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub system: BuildSystem,
    pub path: PathBuf,
}

impl ProjectDescriptor {
    /// Directory checks run in.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }
}

/// Find project descriptors under `root`, skipping build output.
/// Shallowest first, then by path.
pub fn discover(root: &Path) -> Vec<ProjectDescriptor> {
    let mut found: Vec<(usize, ProjectDescriptor)> = WalkDir::new(root)
        .max_depth(MAX_DISCOVERY_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && SKIPPED_DIRS.contains(&e.file_name().to_string_lossy().as_ref()))
        })
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let system = BuildSystem::from_descriptor(&e.file_name().to_string_lossy())?;
            Some((
                e.depth(),
                ProjectDescriptor {
                    system,
                    path: e.into_path(),
                },
            ))
        })
        .collect();
    found.sort_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.path.cmp(&b.path)));
    found.into_iter().map(|(_, d)| d).collect()
}

/// Build, lint and test commands for one build system. `None` means the
/// ecosystem has no conventional command for that check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckProfile {
    pub system: BuildSystem,
    pub build: Option<&'static str>,
    pub lint: Option<&'static str>,
    pub test: Option<&'static str>,
    /// Exit status the test runner uses for "no tests collected".
    pub empty_suite_exit: Option<i32>,
}

impl CheckProfile {
    pub fn command(&self, kind: CheckKind) -> Option<&'static str> {
        match kind {
            CheckKind::Build => self.build,
            CheckKind::Lint => self.lint,
            CheckKind::Test => self.test,
        }
    }

    pub fn for_system(system: BuildSystem) -> Self {
        match system {
            BuildSystem::Cargo => CheckProfile {
                system,
                build: Some("cargo build --workspace --all-targets"),
                lint: Some("cargo clippy --workspace -- -D warnings"),
                test: Some("cargo test --workspace"),
                empty_suite_exit: None,
            },
            BuildSystem::Npm => CheckProfile {
                system,
                build: Some("npm run build --if-present"),
                lint: Some("npm run lint --if-present"),
                test: Some("npm test --if-present"),
                empty_suite_exit: None,
            },
            BuildSystem::Dotnet => CheckProfile {
                system,
                build: Some("dotnet build"),
                lint: Some("dotnet format --verify-no-changes"),
                test: Some("dotnet test"),
                empty_suite_exit: None,
            },
            BuildSystem::Go => CheckProfile {
                system,
                build: Some("go build ./..."),
                lint: Some("go vet ./..."),
                test: Some("go test ./..."),
                empty_suite_exit: None,
            },
            BuildSystem::Python => CheckProfile {
                system,
                build: Some("python3 -m compileall -q ."),
                lint: Some("ruff check ."),
                test: Some("python3 -m pytest -q"),
                empty_suite_exit: Some(5),
            },
            BuildSystem::Make => CheckProfile {
                system,
                build: Some("make"),
                lint: None,
                test: Some("make test"),
                empty_suite_exit: None,
            },
        }
    }
}
