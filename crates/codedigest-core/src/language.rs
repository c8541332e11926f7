//! Extension to language mapping.

/// A language known to the digest: display name and code fence tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub fence: &'static str,
}

const LANGUAGES: &[(&[&str], Language)] = &[
    (&["rs"], Language { name: "Rust", fence: "rust" }),
    (&["py", "pyi"], Language { name: "Python", fence: "python" }),
    (&["ipynb"], Language { name: "Jupyter Notebook", fence: "python" }),
    (&["js", "mjs", "cjs"], Language { name: "JavaScript", fence: "javascript" }),
    (&["jsx"], Language { name: "JavaScript", fence: "jsx" }),
    (&["ts", "mts", "cts"], Language { name: "TypeScript", fence: "typescript" }),
    (&["tsx"], Language { name: "TypeScript", fence: "tsx" }),
    (&["go"], Language { name: "Go", fence: "go" }),
    (&["java"], Language { name: "Java", fence: "java" }),
    (&["kt", "kts"], Language { name: "Kotlin", fence: "kotlin" }),
    (&["scala"], Language { name: "Scala", fence: "scala" }),
    (&["c", "h"], Language { name: "C", fence: "c" }),
    (&["cc", "cpp", "cxx", "hpp", "hh", "hxx"], Language { name: "C++", fence: "cpp" }),
    (&["cs"], Language { name: "C#", fence: "csharp" }),
    (&["swift"], Language { name: "Swift", fence: "swift" }),
    (&["rb"], Language { name: "Ruby", fence: "ruby" }),
    (&["php"], Language { name: "PHP", fence: "php" }),
    (&["lua"], Language { name: "Lua", fence: "lua" }),
    (&["sh", "bash", "zsh"], Language { name: "Shell", fence: "bash" }),
    (&["ps1"], Language { name: "PowerShell", fence: "powershell" }),
    (&["sql"], Language { name: "SQL", fence: "sql" }),
    (&["html", "htm"], Language { name: "HTML", fence: "html" }),
    (&["css"], Language { name: "CSS", fence: "css" }),
    (&["scss", "sass"], Language { name: "Sass", fence: "scss" }),
    (&["vue"], Language { name: "Vue", fence: "vue" }),
    (&["svelte"], Language { name: "Svelte", fence: "svelte" }),
    (&["md", "markdown"], Language { name: "Markdown", fence: "markdown" }),
    (&["rst"], Language { name: "reStructuredText", fence: "rst" }),
    (&["json"], Language { name: "JSON", fence: "json" }),
    (&["yaml", "yml"], Language { name: "YAML", fence: "yaml" }),
    (&["toml"], Language { name: "TOML", fence: "toml" }),
    (&["xml"], Language { name: "XML", fence: "xml" }),
    (&["hs"], Language { name: "Haskell", fence: "haskell" }),
    (&["ex", "exs"], Language { name: "Elixir", fence: "elixir" }),
    (&["erl"], Language { name: "Erlang", fence: "erlang" }),
    (&["clj", "cljs"], Language { name: "Clojure", fence: "clojure" }),
    (&["dart"], Language { name: "Dart", fence: "dart" }),
    (&["r"], Language { name: "R", fence: "r" }),
    (&["jl"], Language { name: "Julia", fence: "julia" }),
    (&["zig"], Language { name: "Zig", fence: "zig" }),
    (&["nix"], Language { name: "Nix", fence: "nix" }),
    (&["tf"], Language { name: "Terraform", fence: "hcl" }),
    (&["proto"], Language { name: "Protocol Buffers", fence: "protobuf" }),
    (&["txt"], Language { name: "Text", fence: "text" }),
];

/// Look up the language for a file extension (case-insensitive, leading dot optional).
pub fn language_for_extension(extension: &str) -> Option<Language> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, lang)| *lang)
}

/// Language name for an extension, `"Other"` when unknown.
pub fn language_name(extension: &str) -> &'static str {
    language_for_extension(extension)
        .map(|l| l.name)
        .unwrap_or("Other")
}
