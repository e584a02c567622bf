//!
//! The LLVM assembly post-processing.
//!
//! Every step is a no-op on its own output, so already processed inputs pass unchanged.
//!

use std::sync::LazyLock;

use crate::target::address_space::AddressSpace;

/// Matches a typed pointer type, e.g. `i8*` or `double**`.
static TYPED_POINTER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\w+\*+").expect("Always valid"));

/// Matches an `alloca` instruction, splitting off the result name.
static ALLOCA: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r#"^(?P<indent>\s*)%(?P<result>"?(?P<name>[-\w$.]+)"?)\s*=\s*alloca\s+(?P<parameters>.+)$"#,
    )
    .expect("Always valid")
});

/// The suffix of the temporary holding the private address space `alloca` result.
pub const ALLOCA_TEMPORARY_SUFFIX: &str = "__amdgpu_private";

///
/// Runs every post-processing step on `assembly`.
///
/// `rename` is the `(original, new)` entry function name pair, if the entry has been renamed.
///
pub fn postprocess(assembly: &str, rename: Option<(&str, &str)>) -> String {
    let assembly = match rename {
        Some((original, new)) => rename_symbol(assembly, original, new),
        None => assembly.to_owned(),
    };
    let assembly = normalize_pointers(assembly.as_str());
    let assembly = replace_null_pointer_extensions(assembly.as_str());
    correct_alloca_address_spaces(assembly.as_str())
}

///
/// Renames the global symbol `@original` to `@new`.
///
/// Longer symbols sharing the prefix, e.g. `@original.1`, are left intact.
///
pub fn rename_symbol(assembly: &str, original: &str, new: &str) -> String {
    let pattern = regex::Regex::new(
        format!(r"@{}(?P<end>[^\w.$-]|$)", regex::escape(original)).as_str(),
    )
    .expect("Always valid");
    pattern
        .replace_all(assembly, |captures: &regex::Captures| {
            format!("@{}{}", new, &captures["end"])
        })
        .into_owned()
}

///
/// Replaces the typed pointers with opaque ones, e.g. `i8*` with `ptr`.
///
pub fn normalize_pointers(assembly: &str) -> String {
    if !assembly.contains('*') {
        return assembly.to_owned();
    }
    TYPED_POINTER.replace_all(assembly, "ptr").into_owned()
}

///
/// Replaces the sign extension of a null pointer with the pointer-to-integer conversion.
///
pub fn replace_null_pointer_extensions(assembly: &str) -> String {
    assembly.replace("sext ptr null to i", "ptrtoint ptr null to i")
}

///
/// Moves the `alloca` instructions without an explicit address space to the private one.
///
/// The data layout requires stack allocations in the private address space, so
/// `%x = alloca i32, align 4` becomes an allocation into a temporary, cast back to the generic
/// address space under the original name.
///
pub fn correct_alloca_address_spaces(assembly: &str) -> String {
    let private = AddressSpace::Private.to_string();
    let generic = AddressSpace::Generic.to_string();

    let mut lines = Vec::new();
    for line in assembly.lines() {
        let captures = match ALLOCA.captures(line) {
            Some(captures) if !has_address_space_operand(&captures["parameters"]) => captures,
            _ => {
                lines.push(line.to_owned());
                continue;
            }
        };

        let indent = &captures["indent"];
        let result = &captures["result"];
        let name = &captures["name"];
        let parameters = &captures["parameters"];

        let mut temporary = format!("{}{}", name, ALLOCA_TEMPORARY_SUFFIX);
        if result.starts_with('"') {
            temporary = format!("\"{}\"", temporary);
        }
        let parameters = match parameters.find(", !") {
            Some(position) => format!(
                "{}, {}{}",
                &parameters[..position],
                private,
                &parameters[position..]
            ),
            None => format!("{}, {}", parameters.trim_end(), private),
        };

        lines.push(format!("{}%{} = alloca {}", indent, temporary, parameters));
        lines.push(format!(
            "{}%{} = addrspacecast ptr {} %{} to ptr {}",
            indent, result, private, temporary, generic
        ));
    }

    let mut corrected = lines.join("\n");
    if assembly.ends_with('\n') {
        corrected.push('\n');
    }
    corrected
}

///
/// Checks whether the `alloca` operands end with an `addrspace(N)` one.
///
/// Only the top-level operands count, so the address space of an allocated pointer type, as in
/// `alloca ptr addrspace(1)`, is not mistaken for the allocation's own.
///
fn has_address_space_operand(parameters: &str) -> bool {
    let mut depth = 0usize;
    for (position, character) in parameters.char_indices() {
        match character {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                if parameters[position + 1..]
                    .trim_start()
                    .starts_with("addrspace(")
                {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}
