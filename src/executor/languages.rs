use std::collections::HashMap;
use std::path::Path;

/// Builds a shell command from the written source file path.
pub type CommandBuilder = fn(&Path) -> String;

/// Per-language execution recipe. Compiled recipes add a compile step that
/// runs before the bounded execute phase; interpreted recipes go straight to
/// execute.
#[derive(Clone)]
pub enum LanguageRecipe {
    Interpreted {
        extension: &'static str,
        run: CommandBuilder,
        default_timeout_ms: u64,
    },
    Compiled {
        extension: &'static str,
        compile: CommandBuilder,
        run: CommandBuilder,
        default_timeout_ms: u64,
    },
}

impl LanguageRecipe {
    pub fn extension(&self) -> &'static str {
        match self {
            LanguageRecipe::Interpreted { extension, .. } => extension,
            LanguageRecipe::Compiled { extension, .. } => extension,
        }
    }

    /// Compile command for the source file, `None` for interpreted languages.
    pub fn compile_command(&self, source: &Path) -> Option<String> {
        match self {
            LanguageRecipe::Interpreted { .. } => None,
            LanguageRecipe::Compiled { compile, .. } => Some(compile(source)),
        }
    }

    pub fn run_command(&self, source: &Path) -> String {
        match self {
            LanguageRecipe::Interpreted { run, .. } => run(source),
            LanguageRecipe::Compiled { run, .. } => run(source),
        }
    }

    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            LanguageRecipe::Interpreted {
                default_timeout_ms, ..
            } => *default_timeout_ms,
            LanguageRecipe::Compiled {
                default_timeout_ms, ..
            } => *default_timeout_ms,
        }
    }
}

/// Static recipe table keyed by language id. The ids follow the common
/// judge numbering so existing clients keep working.
pub struct LanguageRegistry {
    recipes: HashMap<u32, LanguageRecipe>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageRegistry {
    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// The built-in language set.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.insert(
            46,
            LanguageRecipe::Interpreted {
                extension: "sh",
                run: |src| format!("bash {}", src.display()),
                default_timeout_ms: 5_000,
            },
        );
        registry.insert(
            50,
            LanguageRecipe::Compiled {
                extension: "c",
                compile: |src| format!("gcc {} -o main", src.display()),
                run: |_| "./main".to_string(),
                default_timeout_ms: 5_000,
            },
        );
        registry.insert(
            54,
            LanguageRecipe::Compiled {
                extension: "cpp",
                compile: |src| format!("g++ {} -o main", src.display()),
                run: |_| "./main".to_string(),
                default_timeout_ms: 5_000,
            },
        );
        registry.insert(
            62,
            LanguageRecipe::Compiled {
                extension: "java",
                compile: |src| format!("javac {}", src.display()),
                run: |_| "java Main".to_string(),
                default_timeout_ms: 10_000,
            },
        );
        registry.insert(
            63,
            LanguageRecipe::Interpreted {
                extension: "js",
                run: |src| format!("node {}", src.display()),
                default_timeout_ms: 5_000,
            },
        );
        registry.insert(
            71,
            LanguageRecipe::Interpreted {
                extension: "py",
                run: |src| format!("python3 {}", src.display()),
                default_timeout_ms: 5_000,
            },
        );

        registry
    }

    pub fn insert(&mut self, language_id: u32, recipe: LanguageRecipe) {
        self.recipes.insert(language_id, recipe);
    }

    pub fn get(&self, language_id: u32) -> Option<&LanguageRecipe> {
        self.recipes.get(&language_id)
    }

    pub fn supported_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.recipes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
