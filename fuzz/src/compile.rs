#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let compiler = blip::Compiler::new();
    let unit = blip::Unit::new("fuzz", data);
    let output = compiler.compile(&unit).expect("valid template name");
    // Every template produces code, either a render function or a stub.
    assert!(output.code().contains("pub fn render_fuzz("));
    assert_eq!(output.has_errors(), output.code().contains("compile_error!"));
});
