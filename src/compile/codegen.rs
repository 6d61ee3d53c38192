use std::collections::BTreeSet;

use crate::compile::writer::CodeWriter;
use crate::types::ast::{Call, ForLoop, NodeKind, SyntaxNode, SyntaxTree, Typed};
use crate::types::options::Options;
use crate::Unit;

/// Generates the Rust source of the render function for a parsed template.
///
/// When the tree has diagnostics the render function is an error stub that
/// fails compilation with one `compile_error!` per diagnostic.
pub fn generate(tree: &SyntaxTree, unit: &Unit, options: &Options) -> String {
    Generator {
        tree,
        unit,
        options,
        w: CodeWriter::new(),
        depth: 0,
    }
    .generate()
}

/// Returns the path of the render function for a template name.
///
/// The last segment of a dotted name is the function, the others are
/// modules, e.g. `html.userDetail` is `html::render_user_detail`.
pub fn function_path(template: &str) -> String {
    let (modules, name) = match template.rsplit_once('.') {
        Some((modules, name)) => (Some(modules), name),
        None => (None, template),
    };
    let mut path = String::new();
    if let Some(modules) = modules {
        for module in modules.split('.') {
            path.push_str(&snake_case(module));
            path.push_str("::");
        }
    }
    path.push_str(&function_name(name));
    path
}

/// Returns the name of the render function defined for a template.
pub fn function_name(template: &str) -> String {
    let name = template.rsplit('.').next().unwrap_or(template);
    format!("render_{}", snake_case(name))
}

struct Generator<'a> {
    tree: &'a SyntaxTree,
    unit: &'a Unit,
    options: &'a Options,
    w: CodeWriter,
    /// The number of enclosing `@extend`s.
    depth: usize,
}

impl Generator<'_> {
    fn generate(mut self) -> String {
        self.header();
        self.imports();
        if !self.tree.has_errors() {
            self.functions();
        }
        self.render_function();
        self.w.finish()
    }

    fn header(&mut self) {
        self.w.writeln(&format!(
            "// Code generated by blip {}. DO NOT EDIT.",
            env!("CARGO_PKG_VERSION")
        ));
        self.w.writeln(&format!("// Source: {}", self.unit.path()));
        if let Some(package) = self.options.package() {
            self.w.writeln(&format!("// Package: {package}"));
        }
        self.w.newline();
    }

    fn imports(&mut self) {
        let mut imports = BTreeSet::new();
        imports.insert(format!(
            "use {}::{{self as runtime, Context}};",
            self.options.runtime_path()
        ));
        imports.insert(String::from("use std::io::Write;"));
        if !self.tree.has_errors() {
            for import in &self.tree.declarations.imports {
                imports.insert(format!("use {};", import.path));
            }
        }
        for import in &imports {
            self.w.writeln(import);
        }
        self.w.newline();
    }

    fn functions(&mut self) {
        let tree = self.tree;
        for func in &tree.declarations.functions {
            self.w
                .writeln(&format!("// Function block from line: {}", func.line()));
            self.w.write_raw(&verbatim_text(func));
            self.w.newline();
        }
    }

    fn render_function(&mut self) {
        let tree = self.tree;

        let mut params: Vec<String> = Vec::new();
        if !tree.has_errors() {
            for arg in &tree.declarations.args {
                params.push(format!("{}: {}", arg.name, arg.ty));
            }
        }
        params.push(String::from("ctx: &Context<'_>"));
        params.push(String::from("out: &mut dyn Write"));

        self.w.writeln("#[allow(unused_variables, unused_mut)]");
        self.w.open(&format!(
            "pub fn {}({}) -> runtime::Result<()> {{",
            function_name(self.unit.name()),
            params.join(", ")
        ));

        if tree.has_errors() {
            for diag in &tree.diagnostics {
                let msg = format!("{}:{}:{}: {}", self.unit.path(), diag.line, diag.column, diag.message);
                self.w
                    .writeln(&format!("compile_error!(\"{}\");", escape_literal(&msg)));
            }
            self.w.writeln("unreachable!()");
            self.w.close("}");
            return;
        }

        let file_type = escape_literal(self.unit.file_type());
        self.w.open(&format!(
            "runtime::guard(\"{}\", \"{file_type}\", || {{",
            escape_literal(self.unit.name())
        ));
        if needs_escaper(&tree.root) {
            self.w
                .writeln(&format!("let escaper = runtime::escaper_for(\"{file_type}\")?;"));
        }
        for var in &tree.declarations.context {
            match &var.default {
                None => self.w.writeln(&format!(
                    "let {} = ctx.value::<{}>(\"{}\")?;",
                    var.name, var.ty, var.name
                )),
                Some(default) => {
                    self.w.writeln(&format!(
                        "let mut {}: &{} = &({default});",
                        var.name, var.ty
                    ));
                    self.w.open(&format!(
                        "if let Some(value) = ctx.get::<{}>(\"{}\") {{",
                        var.ty, var.name
                    ));
                    self.w.writeln(&format!("{} = value;", var.name));
                    self.w.close("}");
                }
            }
        }
        self.children(&tree.root);
        self.w.writeln("Ok(())");
        self.w.close("})");
        self.w.close("}");
    }

    fn children(&mut self, node: &SyntaxNode) {
        for child in &node.children {
            self.node(child);
        }
    }

    fn node(&mut self, node: &SyntaxNode) {
        if self.options.line_numbers() && node.line() > 0 {
            self.w.writeln(&format!("// Line: {}", node.line()));
        }
        match &node.kind {
            NodeKind::Root | NodeKind::ContentSlot(_) | NodeKind::Else => self.children(node),

            NodeKind::LiteralText => self.write_literal(node.text()),

            // Verbatim text is emitted by its enclosing block.
            NodeKind::VerbatimText | NodeKind::FunctionBlock => {}

            NodeKind::DisplayEscaped => self.w.writeln(&format!(
                "runtime::write_escaped(out, &({}), escaper)?;",
                node.text()
            )),

            NodeKind::DisplayRaw => self
                .w
                .writeln(&format!("runtime::write_raw(out, &({}))?;", node.text())),

            NodeKind::DisplayTyped(typed) => {
                let func = match typed {
                    Typed::Bool => "write_bool",
                    Typed::Int => "write_int",
                    Typed::Int64 => "write_int64",
                };
                self.w
                    .writeln(&format!("runtime::{func}(out, {})?;", node.text()));
            }

            NodeKind::CodeBlock => self.w.write_raw(&verbatim_text(node)),

            NodeKind::TextBlock => self.write_literal(&verbatim_text(node)),

            NodeKind::If => {
                self.w.open(&format!("if {} {{", node.text()));
                for child in &node.children {
                    if child.kind == NodeKind::Else {
                        self.w.dedent();
                        self.w.open("} else {");
                    }
                    self.node(child);
                }
                self.w.close("}");
            }

            NodeKind::For(ForLoop { var, collection }) => {
                self.w.open(&format!("for {var} in {collection} {{"));
                self.children(node);
                self.w.close("}");
            }

            NodeKind::Include(call) => {
                self.w.writeln(&format!("{}?;", call_expr(call, "ctx")));
            }

            NodeKind::IncludeWithContent(call) => self.extend(node, call),

            NodeKind::Yield(name) => self.w.writeln(&format!(
                "runtime::call_context_callback(ctx, \"{}\", out)?;",
                escape_literal(name)
            )),
        }
    }

    /// Layers one callback per content slot over the current context and
    /// calls the extended template with it.
    fn extend(&mut self, node: &SyntaxNode, call: &Call) {
        self.depth += 1;
        let layered = format!("ctx_l{}", self.depth);
        self.w.open("{");
        self.w.writeln(&format!("let {layered} = ctx.child();"));
        for slot in &node.children {
            let NodeKind::ContentSlot(name) = &slot.kind else {
                continue;
            };
            if self.options.line_numbers() {
                self.w.writeln(&format!("// Line: {}", slot.line()));
            }
            self.w.open(&format!(
                "let {layered} = {layered}.with_callback(\"{}\", |out: &mut dyn Write| -> runtime::Result<()> {{",
                escape_literal(name)
            ));
            self.children(slot);
            self.w.writeln("Ok(())");
            self.w.close("});");
        }
        self.w
            .writeln(&format!("{}?;", call_expr(call, &format!("&{layered}"))));
        self.w.close("}");
        self.depth -= 1;
    }

    fn write_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.w
            .writeln(&format!("runtime::write(out, \"{}\")?;", escape_literal(text)));
    }
}

fn call_expr(call: &Call, ctx: &str) -> String {
    let func = function_path(&call.template);
    match &call.args {
        Some(args) => format!("{func}({args}, {ctx}, out)"),
        None => format!("{func}({ctx}, out)"),
    }
}

/// The concatenated verbatim text of a block.
fn verbatim_text(node: &SyntaxNode) -> String {
    node.children.iter().map(SyntaxNode::text).collect()
}

fn needs_escaper(node: &SyntaxNode) -> bool {
    node.kind == NodeKind::DisplayEscaped || node.children.iter().any(needs_escaper)
}

/// Escapes text for embedding in a Rust string literal.
fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut snake = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let boundary = match i.checked_sub(1).map(|j| chars[j]) {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => chars.get(i + 1).is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !snake.ends_with('_') {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else if c.is_alphanumeric() || c == '_' {
            snake.push(c);
        } else {
            snake.push('_');
        }
    }
    snake
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compile::parse::Parser;

    #[test]
    fn function_names() {
        assert_eq!(function_name("userDetail"), "render_user_detail");
        assert_eq!(function_name("HTMLPage"), "render_html_page");
        assert_eq!(function_name("user2Name"), "render_user2_name");
        assert_eq!(function_path("index"), "render_index");
        assert_eq!(function_path("html.root"), "html::render_root");
        assert_eq!(function_path("mail.htmlParts.userRow"), "mail::html_parts::render_user_row");
    }

    #[test]
    fn escape_literal_control_chars() {
        assert_eq!(
            escape_literal("a\"b\\c\n\t\r\u{1}"),
            "a\\\"b\\\\c\\n\\t\\r\\u{1}"
        );
    }

    #[test]
    fn generate_full_file() {
        let code = generate_html(
            "userDetail",
            "@arg user &User\n@import crate::model::User\n<h1>@= user.name @</h1>\n",
        );
        assert_eq!(
            code,
            format!(
                "\
// Code generated by blip {}. DO NOT EDIT.
// Source: templates/userDetail.blip.html
// Package: views

use blip::runtime::{{self as runtime, Context}};
use crate::model::User;
use std::io::Write;

#[allow(unused_variables, unused_mut)]
pub fn render_user_detail(user: &User, ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {{
    runtime::guard(\"userDetail\", \"html\", || {{
        let escaper = runtime::escaper_for(\"html\")?;
        runtime::write(out, \"<h1>\")?;
        runtime::write_escaped(out, &(user.name), escaper)?;
        runtime::write(out, \"</h1>\\n\")?;
        Ok(())
    }})
}}
",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn generate_imports_sorted_and_deduplicated() {
        let code = generate_html(
            "index",
            "@import std::fmt\n@import use crate::a::B;\n@import std::fmt\n",
        );
        let imports: Vec<_> = code.lines().filter(|l| l.starts_with("use ")).collect();
        assert_eq!(
            imports,
            [
                "use blip::runtime::{self as runtime, Context};",
                "use crate::a::B;",
                "use std::fmt;",
                "use std::io::Write;",
            ]
        );
    }

    #[test]
    fn generate_text_block_is_not_reinterpreted() {
        let code = generate_html("index", "@text\n@code let x = 1; @end");
        assert!(code.contains("runtime::write(out, \"\\n@code let x = 1; \")?;"));
        assert!(!code.contains("\n        let x = 1;"));
    }

    #[test]
    fn generate_code_block_verbatim() {
        let code = generate_html("index", "@code\n  let total = items.len();\n@end");
        assert!(code.contains("\n\n  let total = items.len();\n        Ok(())"));
    }

    #[test]
    fn generate_code_block_keeps_string_literals() {
        let code = generate_html("index", "@code\n    let s = \"a\n    b  \";\n@end");
        assert!(code.contains("\n    let s = \"a\n    b  \";\n"));

        let code = generate_html("index", "@code\n \u{3000}a();\n  b();\n@end");
        assert!(code.contains("\n \u{3000}a();\n  b();\n"));
    }

    #[test]
    fn generate_functions_before_render() {
        let code = generate_html("index", "\n@func\nfn double(x: i32) -> i32 {\n    x * 2\n}\n@end");
        assert!(code.contains(
            "// Function block from line: 2\n\nfn double(x: i32) -> i32 {\n    x * 2\n}\n\n#[allow"
        ));
    }

    #[test]
    fn generate_function_block_keeps_string_literals() {
        let code = generate_html("index", "@func\n  const S: &str = \"x\n  y  \";\n@end");
        assert!(code.contains("\n  const S: &str = \"x\n  y  \";\n"));
    }

    #[test]
    fn generate_if_else_and_for() {
        let code = generate_html(
            "index",
            "@for user in users.iter()\n@if user.admin\nA@else\nB@end\n@end",
        );
        assert!(code.contains(
            "\
        for user in users.iter() {
            if user.admin {
                runtime::write(out, \"A\")?;
            } else {
                runtime::write(out, \"\\nB\")?;
            }
            runtime::write(out, \"\\n\")?;
        }
"
        ));
    }

    #[test]
    fn generate_typed_and_raw_displays() {
        let code = generate_html("index", "@bool= a @@int= b @@int64= c @@== d @");
        assert!(code.contains("runtime::write_bool(out, a)?;"));
        assert!(code.contains("runtime::write_int(out, b)?;"));
        assert!(code.contains("runtime::write_int64(out, c)?;"));
        assert!(code.contains("runtime::write_raw(out, &(d))?;"));
        assert!(!code.contains("escaper_for"));
    }

    #[test]
    fn generate_include() {
        let code = generate_html("index", "@include html.header title, 3\n@include footer\n");
        assert!(code.contains("html::render_header(title, 3, ctx, out)?;"));
        assert!(code.contains("render_footer(ctx, out)?;"));
    }

    #[test]
    fn generate_extend_and_yield() {
        let code = generate_html(
            "page",
            "@extend layout\n@content body\nhello\n@end\n@end\n",
        );
        assert!(code.contains(
            "\
        {
            let ctx_l1 = ctx.child();
            let ctx_l1 = ctx_l1.with_callback(\"body\", |out: &mut dyn Write| -> runtime::Result<()> {
                runtime::write(out, \"hello\\n\")?;
                Ok(())
            });
            render_layout(&ctx_l1, out)?;
        }
"
        ));

        let code = generate_html("layout", "<body>@yield body\n</body>");
        assert!(code.contains("runtime::call_context_callback(ctx, \"body\", out)?;"));
    }

    #[test]
    fn generate_nested_extend_layers_do_not_alias() {
        let code = generate_html(
            "page",
            "@extend outer\n@content a\n@extend inner\n@content b\nx\n@end\n@end\n@end\n@end",
        );
        assert!(code.contains("let ctx_l1 = ctx.child();"));
        assert!(code.contains("let ctx_l2 = ctx.child();"));
        assert!(code.contains("render_inner(&ctx_l2, out)?;"));
        assert!(code.contains("render_outer(&ctx_l1, out)?;"));
    }

    #[test]
    fn generate_context_declarations() {
        let code = generate_html(
            "index",
            "@context user User\n@context errors Vec<String> = Vec::new()\n",
        );
        assert!(code.contains(
            "\
        let user = ctx.value::<User>(\"user\")?;
        let mut errors: &Vec<String> = &(Vec::new());
        if let Some(value) = ctx.get::<Vec<String>>(\"errors\") {
            errors = value;
        }
"
        ));
    }

    #[test]
    fn generate_error_stub() {
        let code = generate_html(
            "index",
            "@arg user &User\n@import crate::model::User\n@func\nfn f() {}\n@end\n@if a\n@nope\n",
        );
        assert!(code.contains(
            "\
pub fn render_index(ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
    compile_error!(\"templates/index.blip.html:7:1: unknown directive `@nope`\");
    compile_error!(\"templates/index.blip.html:8:1: missing `@end` for `@if` on line 6, unexpected end of input\");
    unreachable!()
}
"
        ));
        assert!(!code.contains("crate::model::User"));
        assert!(!code.contains("fn f()"));
        assert!(!code.contains("guard"));
    }

    #[test]
    fn generate_line_numbers() {
        let tree = Parser::new("a\n@= b @").parse();
        let unit = Unit::new("index", "");
        let options = Options::builder().line_numbers(true).build();
        let code = generate(&tree, &unit, &options);
        assert!(code.contains(
            "\
        // Line: 1
        runtime::write(out, \"a\\n\")?;
        // Line: 2
        runtime::write_escaped(out, &(b), escaper)?;
"
        ));
    }

    fn generate_html(name: &str, source: &str) -> String {
        let tree = Parser::new(source).parse();
        let unit = Unit::new(name, source)
            .with_path(format!("templates/{name}.blip.html"))
            .with_file_type("html");
        let options = Options::builder().package("views").build();
        generate(&tree, &unit, &options)
    }
}
