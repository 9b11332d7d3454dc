//! Language table
//!
//! Detection is by extension first, well-known filenames second, shebang
//! last. Each language carries the comment syntax used for line
//! classification and the branch tokens counted for cyclomatic-style
//! complexity.

/// Static description of one language.
pub struct LangSpec {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub filenames: &'static [&'static str],
    /// Interpreter names recognized in a `#!` line.
    pub shebangs: &'static [&'static str],
    pub line_comments: &'static [&'static str],
    pub block_comment: Option<(&'static str, &'static str)>,
    /// Tokens counted once per occurrence on code lines.
    pub complexity_tokens: &'static [&'static str],
}

const C_FAMILY_COMPLEXITY: &[&str] = &[
    "if ", "if(", "for ", "for(", "while ", "while(", "case ", "catch ", "&&", "||",
];

const NO_COMPLEXITY: &[&str] = &[];

pub static LANGS: &[LangSpec] = &[
    LangSpec {
        name: "Rust",
        extensions: &["rs"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &[
            "if ", "for ", "while ", "match ", "&&", "||", "else if",
        ],
    },
    LangSpec {
        name: "Go",
        extensions: &["go"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &["if ", "for ", "case ", "select ", "&&", "||"],
    },
    LangSpec {
        name: "C",
        extensions: &["c", "h"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "C++",
        extensions: &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "h++"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "C#",
        extensions: &["cs"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "Java",
        extensions: &["java"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        filenames: &[],
        shebangs: &["node"],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "TypeScript",
        extensions: &["ts", "tsx"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "Python",
        extensions: &["py", "pyi"],
        filenames: &[],
        shebangs: &["python", "python2", "python3"],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: &[
            "if ", "elif ", "for ", "while ", "except ", " and ", " or ",
        ],
    },
    LangSpec {
        name: "Ruby",
        extensions: &["rb", "rake"],
        filenames: &["Rakefile", "Gemfile"],
        shebangs: &["ruby"],
        line_comments: &["#"],
        block_comment: Some(("=begin", "=end")),
        complexity_tokens: &[
            "if ", "elsif ", "unless ", "for ", "while ", "rescue ", "&&", "||",
        ],
    },
    LangSpec {
        name: "Shell",
        extensions: &["sh", "bash", "zsh"],
        filenames: &[],
        shebangs: &["sh", "bash", "zsh", "dash", "ksh"],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: &["if ", "elif ", "for ", "while ", "case ", "&&", "||"],
    },
    LangSpec {
        name: "PHP",
        extensions: &["php"],
        filenames: &[],
        shebangs: &["php"],
        line_comments: &["//", "#"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: C_FAMILY_COMPLEXITY,
    },
    LangSpec {
        name: "Swift",
        extensions: &["swift"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &["if ", "for ", "while ", "case ", "guard ", "&&", "||"],
    },
    LangSpec {
        name: "Kotlin",
        extensions: &["kt", "kts"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &["if ", "for ", "while ", "when ", "&&", "||"],
    },
    LangSpec {
        name: "Scala",
        extensions: &["scala"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &["if ", "for ", "while ", "match ", "case ", "&&", "||"],
    },
    LangSpec {
        name: "Haskell",
        extensions: &["hs"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["--"],
        block_comment: Some(("{-", "-}")),
        complexity_tokens: &["if ", "case ", "| "],
    },
    LangSpec {
        name: "Lua",
        extensions: &["lua"],
        filenames: &[],
        shebangs: &["lua"],
        line_comments: &["--"],
        block_comment: Some(("--[[", "]]")),
        complexity_tokens: &["if ", "elseif ", "for ", "while ", " and ", " or "],
    },
    LangSpec {
        name: "Perl",
        extensions: &["pl", "pm"],
        filenames: &[],
        shebangs: &["perl"],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: &["if ", "elsif ", "unless ", "for ", "while ", "&&", "||"],
    },
    LangSpec {
        name: "R",
        extensions: &["r", "R"],
        filenames: &[],
        shebangs: &["Rscript"],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: &["if ", "for ", "while ", "&&", "||"],
    },
    LangSpec {
        name: "SQL",
        extensions: &["sql"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["--"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: &["case ", "when ", " and ", " or "],
    },
    LangSpec {
        name: "HTML",
        extensions: &["html", "htm"],
        filenames: &[],
        shebangs: &[],
        line_comments: &[],
        block_comment: Some(("<!--", "-->")),
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "CSS",
        extensions: &["css", "scss", "less"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "YAML",
        extensions: &["yaml", "yml"],
        filenames: &[],
        shebangs: &[],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "TOML",
        extensions: &["toml"],
        filenames: &["Cargo.lock"],
        shebangs: &[],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "JSON",
        extensions: &["json"],
        filenames: &[],
        shebangs: &[],
        line_comments: &[],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "Markdown",
        extensions: &["md", "markdown"],
        filenames: &[],
        shebangs: &[],
        line_comments: &[],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "Makefile",
        extensions: &["mk"],
        filenames: &["Makefile", "makefile", "GNUmakefile"],
        shebangs: &["make"],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
    LangSpec {
        name: "Dockerfile",
        extensions: &[],
        filenames: &["Dockerfile"],
        shebangs: &[],
        line_comments: &["#"],
        block_comment: None,
        complexity_tokens: NO_COMPLEXITY,
    },
];

/// Looks a language up by path, falling back to the shebang line for
/// extensionless scripts.
pub fn detect(path: &str, first_line: &str) -> Option<&'static LangSpec> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    if let Some(spec) = LANGS.iter().find(|l| l.filenames.contains(&basename)) {
        return Some(spec);
    }
    if let Some(ext) = basename.rsplit_once('.').map(|(_, ext)| ext) {
        if let Some(spec) = LANGS.iter().find(|l| l.extensions.contains(&ext)) {
            return Some(spec);
        }
    }
    if let Some(rest) = first_line.strip_prefix("#!") {
        let interp = rest
            .split_whitespace()
            .flat_map(|part| part.rsplit('/').next())
            .find(|p| *p != "env")?;
        return LANGS.iter().find(|l| l.shebangs.contains(&interp));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(detect("src/main.rs", "").unwrap().name, "Rust");
        assert_eq!(detect("a/b/c.py", "").unwrap().name, "Python");
        assert!(detect("x.tar.gz", "").is_none());
    }

    #[test]
    fn detects_by_filename() {
        assert_eq!(detect("project/Makefile", "").unwrap().name, "Makefile");
        assert_eq!(detect("Dockerfile", "").unwrap().name, "Dockerfile");
    }

    #[test]
    fn detects_by_shebang() {
        assert_eq!(detect("bin/run", "#!/bin/bash").unwrap().name, "Shell");
        assert_eq!(
            detect("bin/tool", "#!/usr/bin/env python3").unwrap().name,
            "Python"
        );
        assert!(detect("bin/opaque", "no shebang here").is_none());
    }
}
