//! Procedural macros for flowby built-in functions
//!
//! Provides the `#[builtin]` attribute macro for defining built-in free
//! functions whose rustdoc summary becomes the registry description and
//! whose registration function is generated.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, ItemFn, Meta};

/// Extract rustdoc comments from function attributes.
fn extract_doc_comments(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let Meta::NameValue(nv) = &attr.meta {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit_str),
                        ..
                    }) = &nv.value
                    {
                        return Some(lit_str.value());
                    }
                }
            }
            None
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The summary is the first paragraph of the doc comment.
fn doc_summary(raw_doc: &str) -> String {
    let mut summary = String::new();
    for line in raw_doc.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !summary.is_empty() {
                break;
            }
            continue;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(trimmed);
    }
    summary
}

/// Parse builtin attribute arguments: name = "...", category = "..."
fn parse_builtin_args(attr_stream: TokenStream) -> (String, String) {
    let attr_str = attr_stream.to_string();

    let mut name = String::new();
    let mut category = String::new();

    if let Some(start) = attr_str.find("name = \"") {
        let rest = &attr_str[start + 8..];
        if let Some(end) = rest.find('"') {
            name = rest[..end].to_string();
        }
    }

    if let Some(start) = attr_str.find("category = \"") {
        let rest = &attr_str[start + 12..];
        if let Some(end) = rest.find('"') {
            category = rest[..end].to_string();
        }
    }

    (name, category)
}

/// Attribute macro for defining Flowby built-in free functions.
///
/// Generates a `register_<fn>` function that installs the builtin, together
/// with its doc summary, into a `BuiltinRegistry`.
///
/// # Attribute Arguments
///
/// - `name`: The script-visible name (defaults to the function name)
/// - `category`: Category label for the REPL's builtin listing
///
/// # Example
///
/// ```ignore
/// #[builtin(name = "len", category = "Core")]
/// /// Returns the number of elements in a list, dict, or string.
/// pub fn builtin_len(args: &[Value]) -> Result<Value, RuntimeErrorKind> {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn builtin(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let (script_name, category) = parse_builtin_args(attr);

    let fn_name = func.sig.ident.clone();
    let fn_ident_str = fn_name.to_string();

    let name_to_use = if !script_name.is_empty() {
        script_name
    } else {
        fn_ident_str.clone()
    };

    let cat_to_use = if !category.is_empty() {
        category
    } else {
        "Other".to_string()
    };

    let summary = doc_summary(&extract_doc_comments(&func.attrs));

    let register_fn_name = quote::format_ident!("register_{}", fn_name);

    let expanded = quote! {
        #func

        /// Install this builtin into the registry.
        pub fn #register_fn_name(registry: &mut crate::builtins::BuiltinRegistry) {
            registry.register(crate::builtins::BuiltinFn {
                name: #name_to_use,
                category: #cat_to_use,
                summary: #summary,
                func: #fn_name,
            });
        }
    };

    TokenStream::from(expanded)
}
