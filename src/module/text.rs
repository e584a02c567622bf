//!
//! The LLVM assembly module.
//!

use std::sync::LazyLock;

use crate::module::IrModule;
use crate::target::CallingConvention;
use crate::target::FunctionAbi;
use crate::target::Linkage;
use crate::target::Visibility;

/// Matches a function definition header, splitting it around the symbol.
static DEFINITION: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"^define\s+(?P<prefix>[^@]*?)\s*@(?P<symbol>"[^"]*"|[-\w$.]+)(?P<rest>\(.*)$"#)
        .expect("Always valid")
});

/// Matches the first definition clause that must follow the function attributes.
static TRAILING_CLAUSE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"\s+(?:(?:section|partition|comdat|align|gc|prefix|prologue|personality)\b|!)",
    )
    .expect("Always valid")
});

///
/// The module built from LLVM assembly.
///
/// The module-level headers and function definition headers are structured,
/// while the function bodies are kept verbatim.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextModule {
    /// The module name.
    name: String,
    /// The assembly lines.
    lines: Vec<String>,
}

impl TextModule {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(name: &str, assembly: &str) -> Self {
        Self {
            name: name.to_owned(),
            lines: assembly.lines().map(str::to_owned).collect(),
        }
    }

    ///
    /// Creates a module with the module identifier only.
    ///
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            lines: vec![format!("; ModuleID = \"{}\"", name)],
        }
    }

    ///
    /// Appends raw assembly to the end of the module.
    ///
    pub fn append(&mut self, assembly: &str) {
        self.lines.extend(assembly.lines().map(str::to_owned));
    }

    ///
    /// Returns the value of the `target <key>` header, if set.
    ///
    pub fn header(&self, key: &str) -> Option<&str> {
        let prefix = format!("target {} = \"", key);
        self.lines.iter().find_map(|line| {
            line.strip_prefix(prefix.as_str())
                .and_then(|value| value.strip_suffix('"'))
        })
    }

    ///
    /// Sets the `target <key>` header, replacing the existing one.
    ///
    fn set_header(&mut self, key: &str, value: &str) {
        let prefix = format!("target {} =", key);
        let header = format!("{} \"{}\"", prefix, value);

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.starts_with(prefix.as_str()))
        {
            *line = header;
            return;
        }

        let position = self
            .lines
            .iter()
            .take_while(|line| {
                line.starts_with(';')
                    || line.starts_with("source_filename")
                    || line.starts_with("target ")
            })
            .count();
        self.lines.insert(position, header);
    }

    ///
    /// Rewrites a definition header according to `abi`.
    ///
    fn rewrite_definition(prefix: &str, symbol: &str, rest: &str, abi: &FunctionAbi) -> String {
        let mut remaining = Vec::new();
        let mut words = prefix.split_whitespace();
        while let Some(word) = words.next() {
            if word == "cc" {
                words.next();
                continue;
            }
            if Linkage::KEYWORDS.contains(&word)
                || Visibility::KEYWORDS.contains(&word)
                || CallingConvention::KEYWORDS.contains(&word)
            {
                continue;
            }
            remaining.push(word);
        }

        let mut header = vec!["define"];
        header.extend(abi.linkage.keyword());
        header.extend(abi.visibility.keyword());
        header.extend(abi.calling_convention.map(|convention| convention.keyword()));
        header.extend(remaining);

        let rest = rest.trim_end();
        let (signature, opening) = match rest.strip_suffix('{') {
            Some(signature) => (signature.trim_end(), " {"),
            None => (rest, ""),
        };
        let mut signature = signature.to_owned();
        for attribute in abi.attributes.iter() {
            let existing = regex::Regex::new(
                format!(r#"\s*"{}"="[^"]*""#, regex::escape(attribute.key())).as_str(),
            )
            .expect("Always valid");
            signature = existing.replace_all(signature.as_str(), "").into_owned();
        }

        // The attributes follow the parameter list and precede `section`, `comdat`, `!dbg` etc.
        let (parameters, tail) = signature.split_at(parameter_list_end(signature.as_str()));
        let clauses_start = TRAILING_CLAUSE
            .find(tail)
            .map(|clause| clause.start())
            .unwrap_or(tail.len());
        let (attributes, clauses) = tail.split_at(clauses_start);
        let mut rewritten = format!("{}{}", parameters, attributes);
        for attribute in abi.attributes.iter() {
            rewritten.push(' ');
            rewritten.push_str(attribute.to_string().as_str());
        }
        rewritten.push_str(clauses);

        format!("{} @{}{}{}", header.join(" "), symbol, rewritten, opening)
    }
}

impl IrModule for TextModule {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn set_triple(&mut self, triple: &str) {
        self.set_header("triple", triple);
    }

    fn set_data_layout(&mut self, data_layout: &str) {
        self.set_header("datalayout", data_layout);
    }

    fn set_function_abi(&mut self, name: &str, abi: &FunctionAbi) -> anyhow::Result<bool> {
        for line in self.lines.iter_mut() {
            let rewritten = match DEFINITION.captures(line) {
                Some(captures) if unquote(&captures["symbol"]) == name => {
                    Self::rewrite_definition(
                        &captures["prefix"],
                        &captures["symbol"],
                        &captures["rest"],
                        abi,
                    )
                }
                _ => continue,
            };
            *line = rewritten;
            return Ok(true);
        }
        Ok(false)
    }

    fn function_definition(&self, name: &str) -> Option<String> {
        self.lines
            .iter()
            .find(|line| {
                DEFINITION
                    .captures(line)
                    .map(|captures| unquote(&captures["symbol"]) == name)
                    .unwrap_or_default()
            })
            .cloned()
    }

    fn print_to_string(&self) -> String {
        let mut assembly = self.lines.join("\n");
        assembly.push('\n');
        assembly
    }

    fn clone_module(&self) -> Box<dyn IrModule> {
        Box::new(self.clone())
    }
}

///
/// Returns the position right after the parenthesized parameter list `signature` starts with.
///
fn parameter_list_end(signature: &str) -> usize {
    let mut depth = 0usize;
    for (position, character) in signature.char_indices() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return position + 1;
                }
            }
            _ => {}
        }
    }
    signature.len()
}

fn unquote(symbol: &str) -> &str {
    symbol
        .strip_prefix('"')
        .and_then(|symbol| symbol.strip_suffix('"'))
        .unwrap_or(symbol)
}

#[cfg(test)]
mod tests {
    use super::TextModule;
    use crate::module::IrModule;
    use crate::target::Architecture;
    use crate::target::FunctionAbi;
    use crate::target::FunctionRole;
    use crate::target::DATA_LAYOUT;
    use crate::target::TRIPLE;

    const ASSEMBLY: &str = r#"; ModuleID = "saxpy"
target triple = "x86_64-unknown-linux-gnu"

define internal fastcc i32 @saxpy(ptr %a, ptr %b) #0 {
entry:
  ret i32 0
}

define void @"helper.1"() {
  ret void
}

declare i32 @external(i32)
"#;

    fn gfx90a() -> Architecture {
        Architecture::new("gfx90a").expect("Always valid")
    }

    #[test]
    fn replaces_and_inserts_headers() {
        let mut module = TextModule::new("saxpy", ASSEMBLY);
        module.set_triple(TRIPLE);
        module.set_data_layout(DATA_LAYOUT);

        assert_eq!(module.header("triple"), Some(TRIPLE));
        assert_eq!(module.header("datalayout"), Some(DATA_LAYOUT));
        let printed = module.print_to_string();
        assert_eq!(printed.matches("target triple").count(), 1);
        assert!(printed.find("target datalayout") < printed.find("define"));
    }

    #[test]
    fn kernel_contract_rewrites_definition() {
        let mut module = TextModule::new("saxpy", ASSEMBLY);
        let abi = FunctionAbi::new(FunctionRole::Kernel, &gfx90a());

        assert!(module.set_function_abi("saxpy", &abi).expect("Always valid"));
        let definition = module.function_definition("saxpy").expect("Always exists");
        assert_eq!(
            definition,
            "define protected amdgpu_kernel i32 @saxpy(ptr %a, ptr %b) #0 \
             \"amdgpu-flat-work-group-size\"=\"1,1024\" \"target-cpu\"=\"gfx90a\" \
             \"target-features\"=\"+wavefrontsize64\" \"uniform-work-group-size\"=\"true\" {"
        );
    }

    #[test]
    fn rewriting_is_idempotent() {
        let mut module = TextModule::new("saxpy", ASSEMBLY);
        let abi = FunctionAbi::new(FunctionRole::DeviceFunction, &gfx90a());

        module.set_function_abi("helper.1", &abi).expect("Always valid");
        let once = module.print_to_string();
        module.set_function_abi("helper.1", &abi).expect("Always valid");
        assert_eq!(module.print_to_string(), once);
        assert!(once.contains("define linkonce_odr hidden void @\"helper.1\"() \"target-cpu\""));
    }

    #[test]
    fn attributes_precede_trailing_clauses() {
        let mut module = TextModule::new(
            "k",
            "define void @k(ptr %a, { i32, i32 } %b) #1 section \".text.k\" !dbg !5 {\n  ret void\n}",
        );
        let abi = FunctionAbi::new(FunctionRole::Kernel, &gfx90a());

        module.set_function_abi("k", &abi).expect("Always valid");
        let definition = module.function_definition("k").expect("Always exists");
        assert_eq!(
            definition,
            "define protected amdgpu_kernel void @k(ptr %a, { i32, i32 } %b) #1 \
             \"amdgpu-flat-work-group-size\"=\"1,1024\" \"target-cpu\"=\"gfx90a\" \
             \"target-features\"=\"+wavefrontsize64\" \"uniform-work-group-size\"=\"true\" \
             section \".text.k\" !dbg !5 {"
        );

        module.set_function_abi("k", &abi).expect("Always valid");
        assert_eq!(
            module.function_definition("k").expect("Always exists"),
            definition
        );
    }

    #[test]
    fn declarations_are_not_definitions() {
        let mut module = TextModule::new("saxpy", ASSEMBLY);
        let abi = FunctionAbi::new(FunctionRole::Kernel, &gfx90a());

        assert!(!module.set_function_abi("external", &abi).expect("Always valid"));
        assert!(module.function_definition("external").is_none());
    }
}
