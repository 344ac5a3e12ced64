use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::ast::File;
use crate::config::TranspileOptions;
use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::parser::parse_file;
use crate::resolver::Resolver;
use crate::source::load_unit;
use crate::translate::Translator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationArtifact {
    /// The generated `main.odin`.
    pub odin: String,
    /// Source files merged into the unit, empty for in-memory input.
    pub sources: Vec<PathBuf>,
    /// Number of placeholders emitted for unsupported constructs.
    pub placeholders: usize,
}

pub fn compile_source(
    source: &str,
    options: &TranspileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let file = parse_file(source)?;
    Ok(transpile(&file, options))
}

/// Translate a `.go` file, or every `main`-package file of a directory.
pub fn compile_path(
    path: impl AsRef<Path>,
    options: &TranspileOptions,
) -> Result<CompilationArtifact, CoreError> {
    let unit = load_unit(path)?;
    let mut artifact = transpile(&unit.file, options);
    artifact.sources = unit.sources;
    Ok(artifact)
}

/// Census every declaration, then translate them in source order. All
/// state is created here, so the result depends only on `file` and
/// `options`.
pub fn transpile(file: &File, options: &TranspileOptions) -> CompilationArtifact {
    let mut ctx = CompilationContext::new();
    let mut resolver = Resolver::new();
    resolver.populate_imports(file);
    ctx.census(file, &mut resolver);

    let mut odin = header(&resolver);
    let blocks: Vec<String> = {
        let mut translator = Translator::new(&mut ctx, &mut resolver, options);
        file.decls
            .iter()
            .filter_map(|decl| translator.decl(decl))
            .collect()
    };
    if !blocks.is_empty() {
        odin.push('\n');
        odin.push_str(blocks.join("\n\n").trim_end());
        odin.push('\n');
    }

    let placeholders = ctx.placeholders();
    info!(
        "translated {} declaration(s) into {} line(s)",
        blocks.len(),
        odin.lines().count()
    );
    if placeholders > 0 {
        warn!("{placeholders} construct(s) were left as placeholders");
    }
    CompilationArtifact {
        odin,
        sources: Vec::new(),
        placeholders,
    }
}

fn header(resolver: &Resolver) -> String {
    let mut lines = vec![
        "package main".to_string(),
        String::new(),
        "import \"core:mem\"".to_string(),
        "import \"core:fmt\"".to_string(),
    ];
    if resolver.imports_path("os") {
        lines.push("import \"core:os\"".to_string());
        lines.push("import golden_os \"golden/os\"".to_string());
    }
    if resolver.imports_path("sync") {
        lines.push("import \"core:sync\"".to_string());
    }
    lines.push("import golden \"golden\"".to_string());
    let mut header = lines.join("\n");
    header.push('\n');
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn quiet() -> TranspileOptions {
        TranspileOptions {
            leak_check: false,
            ..TranspileOptions::default()
        }
    }

    fn odin(source: &str) -> String {
        compile_source(source, &quiet()).expect("translation").odin
    }

    fn expected(lines: &[&str]) -> String {
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    #[test]
    fn plain_values_stay_on_the_stack() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            func main() {
                score := 100
                fmt.Println(score)
            }
        "#});
        assert_eq!(
            out,
            expected(&[
                "package main",
                "",
                "import \"core:mem\"",
                "import \"core:fmt\"",
                "import golden \"golden\"",
                "",
                "main :: proc() {",
                "\tscore := 100",
                "\tfmt.println(score)",
                "}",
            ])
        );
    }

    #[test]
    fn returned_allocation_is_ref_counted_and_kept() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            type User struct {
                Name   string
                Health int
            }

            func NewUser(name string) *User {
                u := &User{Name: name, Health: 100}
                return u
            }

            func main() {
                u := NewUser("alice")
                u.Health -= 10
                fmt.Println(u.Name)
            }
        "#});
        assert_eq!(
            out,
            expected(&[
                "package main",
                "",
                "import \"core:mem\"",
                "import \"core:fmt\"",
                "import golden \"golden\"",
                "",
                "User :: struct {",
                "\tName: string,",
                "\tHealth: int,",
                "}",
                "",
                "NewUser :: proc(name: string) -> golden.Arc(User) {",
                "\tu := golden.make_arc(User{Name = name, Health = 100})",
                "\treturn u",
                "}",
                "",
                "main :: proc() {",
                "\tu := NewUser(\"alice\")",
                "\tdefer golden.arc_release(&u)",
                "\tu.data.Health -= 10",
                "\tfmt.println(u.data.Name)",
                "}",
            ])
        );
    }

    #[test]
    fn goroutine_captures_wait_group_by_address_and_index_by_value() {
        let out = odin(indoc! {r#"
            package main

            import (
                "fmt"
                "sync"
            )

            func main() {
                var wg sync.WaitGroup
                for i := 0; i < 3; i++ {
                    wg.Add(1)
                    go func() {
                        defer wg.Done()
                        fmt.Println(i)
                    }()
                }
                wg.Wait()
            }
        "#});
        assert_eq!(
            out,
            expected(&[
                "package main",
                "",
                "import \"core:mem\"",
                "import \"core:fmt\"",
                "import \"core:sync\"",
                "import golden \"golden\"",
                "",
                "main :: proc() {",
                "\tgolden.pool_start(8)",
                "\tdefer golden.pool_stop()",
                "\twg: golden.WaitGroup",
                "\tgolden.wg_init(&wg)",
                "\tfor i := 0; i < 3; i += 1 {",
                "\t\t{",
                "\t\t\tgolden.wg_add(&wg, 1)",
                "\t\t\t_closure_ctx_0 :: struct {",
                "\t\t\t\t_allocator: mem.Allocator,",
                "\t\t\t\twg: ^golden.WaitGroup,",
                "\t\t\t\ti: int,",
                "\t\t\t}",
                "\t\t\t_ctx_0 := new(_closure_ctx_0)",
                "\t\t\t_ctx_0._allocator = context.allocator",
                "\t\t\t_ctx_0.wg = &wg",
                "\t\t\t_ctx_0.i = i",
                "\t\t\t_go_wrapper_0 :: proc(data: rawptr) {",
                "\t\t\t\tctx := cast(^_closure_ctx_0)data",
                "\t\t\t\tdefer free(ctx, ctx._allocator)",
                "\t\t\t\tdefer golden.wg_done(ctx.wg)",
                "\t\t\t\tfmt.println(ctx.i)",
                "\t\t\t}",
                "\t\t\tgolden.spawn_raw(_go_wrapper_0, _ctx_0)",
                "\t\t}",
                "\t}",
                "\tgolden.wg_wait(&wg)",
                "}",
            ])
        );
        assert_eq!(out.matches(":: struct {").count(), 1);
    }

    #[test]
    fn goroutine_parameters_become_record_fields() {
        let out = odin(indoc! {r#"
            package main

            import (
                "fmt"
                "sync"
            )

            func main() {
                var wg sync.WaitGroup
                for i := 0; i < 2; i++ {
                    wg.Add(1)
                    go func(id int) {
                        defer wg.Done()
                        fmt.Println(id)
                    }(i)
                }
                wg.Wait()
            }
        "#});
        assert!(out.contains("\t\t\t\tid: int,\n\t\t\t\twg: ^golden.WaitGroup,\n"));
        assert!(out.contains("_ctx_0.id = i\n"));
        assert!(out.contains("fmt.println(ctx.id)"));
    }

    #[test]
    fn local_allocation_uses_the_frame() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            type Point struct {
                X int
                Y int
            }

            func main() {
                p := &Point{X: 1, Y: 2}
                fmt.Println(p.X)
            }
        "#});
        assert!(out.contains(
            "main :: proc() {\n\
             \t_frame := golden.frame_begin()\n\
             \tdefer golden.frame_end(&_frame)\n\
             \tp := golden.frame_new(Point{}, &_frame)\n\
             \tgolden.frame_init(p, Point{X = 1, Y = 2})\n\
             \tfmt.println(p.X)\n\
             }"
        ));
        assert!(!out.contains("make_arc"));
    }

    #[test]
    fn inner_scope_shadowing_does_not_leak_outward() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            type Point struct {
                X int
            }

            func main() {
                x := 1
                if x > 0 {
                    x := &Point{X: 1}
                    fmt.Println(x.X)
                }
                fmt.Println(x)
            }
        "#});
        assert!(out.contains("\t\tx := golden.make_arc(Point{X = 1})\n"));
        assert!(out.contains("\t\tdefer golden.arc_release(&x)\n"));
        assert!(out.contains("\t\tfmt.println(x.data.X)\n"));
        assert!(out.contains("\tfmt.println(x)\n}"));
    }

    #[test]
    fn method_receivers_follow_the_declared_convention() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            type Counter struct {
                N int
            }

            func (c *Counter) Inc() {
                c.N++
            }

            func (c Counter) Get() int {
                return c.N
            }

            func NewCounter() *Counter {
                c := &Counter{}
                return c
            }

            func main() {
                c := NewCounter()
                c.Inc()
                fmt.Println(c.Get())
                var v Counter
                v.Inc()
                fmt.Println(v.Get())
            }
        "#});
        assert!(out.contains("Counter_Inc :: proc(c: ^Counter) {\n\tc.N += 1\n}"));
        assert!(out.contains("Counter_Get :: proc(c: Counter) -> int {\n\treturn c.N\n}"));
        assert!(out.contains("NewCounter :: proc() -> golden.Arc(Counter) {"));
        assert!(out.contains("\tCounter_Inc(c.data)\n"));
        assert!(out.contains("\tfmt.println(Counter_Get(c.data^))\n"));
        assert!(out.contains("\tCounter_Inc(&v)\n"));
        assert!(out.contains("\tfmt.println(Counter_Get(v))\n"));
    }

    #[test]
    fn collections_channels_and_errors_get_cleanup() {
        let out = odin(indoc! {r#"
            package main

            import (
                "errors"
                "fmt"
            )

            func parse(s string) (int, error) {
                if s == "" {
                    return 0, errors.New("empty")
                }
                return len(s), nil
            }

            func main() {
                xs := make([]int, 0)
                xs = append(xs, 1, 2)
                for i, x := range xs {
                    fmt.Println(i, x)
                }
                ch := make(chan int)
                n, err := parse("abc")
                if err != nil {
                    return
                }
                fmt.Println(n, ch)
            }
        "#});
        assert!(out.contains("parse :: proc(s: string) -> (int, golden.Error) {"));
        assert!(out.contains("\t\treturn 0, golden.error_new(\"empty\")\n"));
        assert!(out.contains("\txs := make([dynamic]int, 0)\n\tdefer delete(xs)\n"));
        assert!(out.contains("\tappend(&xs, 1, 2)\n"));
        assert!(out.contains("\tfor x, i in xs {\n\t\tfmt.println(i, x)\n\t}\n"));
        assert!(out.contains("\tch := golden.chan_make(int)\n\tdefer golden.chan_destroy(ch)\n"));
        assert!(out.contains("\tn, err := parse(\"abc\")\n\tdefer golden.error_free(err)\n"));
    }

    #[test]
    fn os_and_leak_check_shape_the_output() {
        let out = compile_source(
            indoc! {r#"
                package main

                import "os"

                func main() {
                    os.Exit(1)
                }
            "#},
            &TranspileOptions::default(),
        )
        .expect("translation")
        .odin;
        assert!(out.contains("import \"core:os\"\nimport golden_os \"golden/os\"\n"));
        assert!(out.contains("\ttrack: mem.Tracking_Allocator\n"));
        assert!(out.contains("MEMORY LEAK DETECTED"));
        assert!(out.contains("\tgolden_os.exit(1)\n}"));
        assert!(!out.contains("pool_start"));
    }

    #[test]
    fn unsupported_constructs_become_placeholders() {
        let artifact = compile_source(
            indoc! {r#"
                package main

                func worker() {}

                func main() {
                    go worker()
                    select {}
                }
            "#},
            &quiet(),
        )
        .expect("translation never aborts on unsupported input");
        assert_eq!(artifact.placeholders, 2);
        assert_eq!(artifact.odin.matches("// golden: unsupported").count(), 2);
    }

    #[test]
    fn direct_literal_return_is_ref_counted() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            type User struct {
                Name string
            }

            func NewUser() *User {
                return &User{Name: "a"}
            }

            func main() {
                u := NewUser()
                fmt.Println(u.Name)
            }
        "#});
        assert!(out.contains("NewUser :: proc() -> golden.Arc(User) {\n"));
        assert!(out.contains("\treturn golden.make_arc(User{Name = \"a\"})\n"));
        assert!(out.contains("\tu := NewUser()\n\tdefer golden.arc_release(&u)\n"));
        assert!(!out.contains("new_clone"));
    }

    #[test]
    fn mixed_ownership_returns_stay_plain_pointers() {
        let out = odin(indoc! {r#"
            package main

            type User struct {
                Name string
            }

            func Find(ok bool, other *User) *User {
                u := &User{}
                if ok {
                    return u
                }
                return other
            }

            func main() {}
        "#});
        assert!(out.contains("Find :: proc(ok: b8, other: ^User) -> ^User {\n"));
        assert!(out.contains("\tu := new_clone(User{})\n"));
        assert!(out.contains("\t\treturn u\n"));
        assert!(out.contains("\treturn other\n"));
        assert!(!out.contains("make_arc"));
    }

    #[test]
    fn goroutine_captures_names_shadowed_later_in_a_nested_block() {
        let out = odin(indoc! {r#"
            package main

            import (
                "fmt"
                "sync"
            )

            func main() {
                var wg sync.WaitGroup
                x := 1
                wg.Add(1)
                go func() {
                    defer wg.Done()
                    fmt.Println(x)
                    if true {
                        x := 2
                        fmt.Println(x)
                    }
                }()
                wg.Wait()
            }
        "#});
        assert!(out.contains("\twg: ^golden.WaitGroup,\n"));
        assert!(out.contains("\tx: int,\n"));
        assert!(out.contains("_ctx_0.x = x\n"));
        assert!(out.contains("fmt.println(ctx.x)\n"));
        assert!(out.contains("x := 2\n"));
        assert!(out.contains("fmt.println(x)\n"));
    }

    #[test]
    fn formatted_errors_and_plain_prints() {
        let out = odin(indoc! {r#"
            package main

            import "fmt"

            func check(n int) error {
                if n < 0 {
                    return fmt.Errorf("bad %d", n)
                }
                return nil
            }

            func main() {
                s := fmt.Sprint("n=", 1)
                fmt.Println(s)
            }
        "#});
        assert!(out.contains("\t\treturn golden.error_new(fmt.tprintf(\"bad %d\", n))\n"));
        assert!(out.contains("\ts := fmt.tprint(\"n=\", 1)\n"));
    }

    #[test]
    fn translation_is_repeatable() {
        let source = indoc! {r#"
            package main

            import "sync"

            func main() {
                var wg sync.WaitGroup
                wg.Add(1)
                go func() {
                    defer wg.Done()
                }()
                wg.Wait()
            }
        "#};
        assert_eq!(odin(source), odin(source));
    }

    #[test]
    fn reports_parse_failures() {
        let err = compile_source("func main() {}", &quiet()).unwrap_err();
        assert!(matches!(err, CoreError::ParseError { .. }));
    }
}
