mod helpers;

use blip::runtime::{self, Context};
use blip::{Compiler, Unit};

use crate::helpers::{render, Writer};

const LAYOUT: &str = "\
@arg title &str
<html><title>@= title @</title>
<body>@yield body
</body></html>
";

const PAGE: &str = "\
@arg user &str
@context greeting String = String::from(\"Hello\")
@extend layout \"Users\"
@content body
<p>@= greeting @, @= user @!</p>
@end
@end
";

const ITEMS: &str = "\
@arg items &[i32]
@int= items[3] as isize @
";

const PROFILE: &str = "\
@context user String
@= user @
";

/// The render functions generated for the templates above, as emitted by the
/// compiler.
mod generated {
    use blip::runtime::{self as runtime, Context};
    use std::io::Write;

    #[allow(unused_variables, unused_mut)]
    pub fn render_layout(title: &str, ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
        runtime::guard("layout", "html", || {
            let escaper = runtime::escaper_for("html")?;
            runtime::write(out, "<html><title>")?;
            runtime::write_escaped(out, &(title), escaper)?;
            runtime::write(out, "</title>\n<body>")?;
            runtime::call_context_callback(ctx, "body", out)?;
            runtime::write(out, "</body></html>\n")?;
            Ok(())
        })
    }

    #[allow(unused_variables, unused_mut)]
    pub fn render_page(user: &str, ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
        runtime::guard("page", "html", || {
            let escaper = runtime::escaper_for("html")?;
            let mut greeting: &String = &(String::from("Hello"));
            if let Some(value) = ctx.get::<String>("greeting") {
                greeting = value;
            }
            {
                let ctx_l1 = ctx.child();
                let ctx_l1 = ctx_l1.with_callback("body", |out: &mut dyn Write| -> runtime::Result<()> {
                    runtime::write(out, "<p>")?;
                    runtime::write_escaped(out, &(greeting), escaper)?;
                    runtime::write(out, ", ")?;
                    runtime::write_escaped(out, &(user), escaper)?;
                    runtime::write(out, "!</p>\n")?;
                    Ok(())
                });
                render_layout("Users", &ctx_l1, out)?;
            }
            runtime::write(out, "\n")?;
            Ok(())
        })
    }

    #[allow(unused_variables, unused_mut)]
    pub fn render_items(items: &[i32], ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
        runtime::guard("items", "text", || {
            runtime::write_int(out, items[3] as isize)?;
            runtime::write(out, "\n")?;
            Ok(())
        })
    }

    #[allow(unused_variables, unused_mut)]
    pub fn render_profile(ctx: &Context<'_>, out: &mut dyn Write) -> runtime::Result<()> {
        runtime::guard("profile", "text", || {
            let escaper = runtime::escaper_for("text")?;
            let user = ctx.value::<String>("user")?;
            runtime::write_escaped(out, &(user), escaper)?;
            runtime::write(out, "\n")?;
            Ok(())
        })
    }
}

#[test]
fn generated_code_matches_compiler_output() {
    let cases = [
        ("layout.blip.html", LAYOUT, "render_layout"),
        ("page.blip.html", PAGE, "render_page"),
        ("items.blip", ITEMS, "render_items"),
        ("profile.blip", PROFILE, "render_profile"),
    ];
    let generated = include_str!("runtime.rs");
    for (file_name, source, func) in cases {
        let code = Compiler::new()
            .compile(&Unit::from_file_name(file_name, source))
            .unwrap()
            .into_result()
            .unwrap();
        let start = code.find("#[allow").unwrap();
        let expected: String = code[start..]
            .lines()
            .map(|line| format!("    {line}\n"))
            .collect();
        assert!(
            generated.contains(&expected),
            "generated `{func}` is out of date:\n{expected}"
        );
    }
}

#[test]
fn render_extend_with_content() {
    let ctx = Context::new();
    let result = render(|w| generated::render_page("<Ann>", &ctx, w));
    assert_eq!(
        result,
        "<html><title>Users</title>\n<body><p>Hello, &lt;Ann&gt;!</p>\n</body></html>\n\n"
    );
}

#[test]
fn render_context_overrides_default() {
    let ctx = Context::new().with_value("greeting", String::from("Hi"));
    let result = render(|w| generated::render_page("Ann", &ctx, w));
    assert!(result.contains("<p>Hi, Ann!</p>"));
}

#[test]
fn render_yield_without_content_is_noop() {
    let ctx = Context::new();
    let result = render(|w| generated::render_layout("T", &ctx, w));
    assert_eq!(result, "<html><title>T</title>\n<body></body></html>\n");
}

#[test]
fn render_outer_content_reaches_nested_layout() {
    // A slot bound further out is still found by the nearest lookup.
    let ctx = Context::new().with_callback("body", |out: &mut dyn std::io::Write| {
        out.write_all(b"outer")?;
        Ok(())
    });
    let child = ctx.child();
    let result = render(|w| generated::render_layout("T", &child, w));
    assert_eq!(result, "<html><title>T</title>\n<body>outer</body></html>\n");
}

#[test]
fn render_missing_context_value() {
    let ctx = Context::new();
    let err = generated::render_profile(&ctx, &mut Writer::new()).unwrap_err();
    assert!(matches!(err, runtime::Error::MissingContext { ref key, .. } if key == "user"));

    let ctx = Context::new().with_value("user", String::from("<b>"));
    assert_eq!(render(|w| generated::render_profile(&ctx, w)), "<b>\n");
}

#[test]
fn render_recovers_from_panic() {
    let ctx = Context::new();
    let err = generated::render_items(&[1, 2], &ctx, &mut Writer::new()).unwrap_err();
    match err {
        runtime::Error::Recovered { template, message } => {
            assert_eq!(template, "items");
            assert!(message.contains("index out of bounds"), "{message}");
        }
        err => panic!("unexpected error: {err}"),
    }
    assert_eq!(
        render(|w| generated::render_items(&[1, 2, 3, 4], &ctx, w)),
        "4\n"
    );
}

#[test]
fn render_propagates_write_errors() {
    let ctx = Context::new();
    let mut w = Writer::with_max(2);
    let err = generated::render_page("Ann", &ctx, &mut w).unwrap_err();
    assert!(matches!(err, runtime::Error::Io(_)));
    assert_eq!(w.writes(), 2);
}
