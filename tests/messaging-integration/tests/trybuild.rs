//! trybuild 编译期测试：宏展开后的代码能在独立 crate 中编译

#[test]
fn ui_processor_macros() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/processor_ok.rs");
    t.pass("tests/ui/component_ok.rs");
}
