//! End-to-end tests for the rotlang compiler pipeline.
//!
//! These tests drive whole programs through the library entry points —
//! parse, `.east` round trips, optimization, codegen and unparsing — and
//! assert on the artifacts the way a VM (or a reviewer) would see them.

#[cfg(test)]
mod scenarios {
    use rotlang_ast::{AstTree, Literal, NodeId, NodeKind, SemType, TokenKind};

    fn child(tree: &AstTree, id: NodeId, idx: usize) -> NodeId {
        tree.child(id, idx).expect("missing child")
    }

    /// `micdrop 40 + 2;` parses to a PROGRAM with one int `main` whose
    /// body ends in a RETURN of a BINARY(+) over two literals, and the
    /// optimizer collapses the return expression to the literal 42.
    #[test]
    fn s1_constant_addition_folds_to_42() {
        let mut tree = rotlang::parse("npc main() yap micdrop 40 + 2; yapity").unwrap();

        let root = tree.root.unwrap();
        assert!(matches!(tree.kind(root), NodeKind::Program));
        assert_eq!(tree.children_count(root), 1);

        let func = child(&tree, root, 0);
        let NodeKind::Func { name, ret } = tree.kind(func) else {
            panic!("expected FUNC");
        };
        assert_eq!(tree.name(*name), "main");
        assert_eq!(*ret, SemType::Int);

        let body = child(&tree, func, 1);
        let ret_stmt = tree.children(body).last().unwrap();
        assert!(matches!(tree.kind(ret_stmt), NodeKind::Return));
        let expr = child(&tree, ret_stmt, 0);
        assert!(matches!(tree.kind(expr), NodeKind::Binary(TokenKind::Plus)));
        assert!(
            tree.children(expr)
                .all(|c| matches!(tree.kind(c), NodeKind::NumLit(_)))
        );

        rotlang::optimize(&mut tree);

        let body = child(&tree, child(&tree, tree.root.unwrap(), 0), 1);
        let ret_stmt = tree.children(body).last().unwrap();
        let expr = child(&tree, ret_stmt, 0);
        assert_eq!(tree.kind(expr).as_num_lit(), Some(Literal::Int(42)));
    }

    /// `x * 1` simplifies to `x`, and the generated code calls `:fn_f`
    /// exactly once from main, placing the argument at `RAM[SP + 1]`.
    #[test]
    fn s2_identity_simplification_and_call_frame() {
        let mut tree = rotlang::parse(
            "npc f(npc x) yap micdrop x * 1; yapity \
             npc main() yap micdrop f(7); yapity",
        )
        .unwrap();
        rotlang::optimize(&mut tree);

        let f = child(&tree, tree.root.unwrap(), 0);
        let f_body = child(&tree, f, 1);
        let f_ret = tree.children(f_body).last().unwrap();
        let f_expr = child(&tree, f_ret, 0);
        assert!(
            matches!(tree.kind(f_expr), NodeKind::Ident { .. }),
            "x * 1 must simplify to x"
        );

        let asm = rotlang::emit_asm(&tree).unwrap();
        assert_eq!(asm.matches("CALL :fn_f").count(), 1);
        assert!(asm.contains(
            "PUSH 7\nPUSHR x14\nPOPR x13\nPUSHR x13\nPUSH 1\nADD\nPOPR x13\nPOPM x13\nCALL :fn_f"
        ));
    }

    /// Division by zero survives optimization, and a float return
    /// context lowers it as `PUSH 1 / ITOF / PUSH 0 / ITOF / FDIV`.
    #[test]
    fn s3_division_by_zero_is_preserved_and_floats() {
        let mut tree = rotlang::parse("homie main() yap micdrop 1 / 0; yapity").unwrap();
        let changed = rotlang::optimize(&mut tree);
        assert!(!changed, "1 / 0 must not fold");

        let asm = rotlang::emit_asm(&tree).unwrap();
        assert!(asm.contains("PUSH 1\nITOF\nPUSH 0\nITOF\nFDIV"), "got:\n{asm}");
    }

    /// `homie x gaslight 3;` coerces the int initializer on store, the
    /// local lives at `RAM[BP + 1]`, and the return path stores 0 into
    /// `x0` before jumping to the function exit label.
    #[test]
    fn s4_store_coercion_and_frame_slot() {
        let tree =
            rotlang::parse("npc main() yap homie x gaslight 3; micdrop 0; yapity").unwrap();
        let asm = rotlang::emit_asm(&tree).unwrap();

        assert!(asm.contains(
            "PUSH 3\nITOF\nPUSHR x15\nPOPR x13\nPUSHR x13\nPUSH 1\nADD\nPOPR x13\nPOPM x13"
        ));
        assert!(asm.contains("PUSH 0\nPOPR x0\nJMP :L_fn_end_"));
    }

    /// The alpha/omega/sigma chain builds
    /// `IF(cond, BLOCK, BRANCH(cond, BLOCK, ELSE(BLOCK)))` and lowers to
    /// two arm labels plus one end label, with a `JMP` to the end after
    /// each taken arm.
    #[test]
    fn s5_if_chain_structure_and_labels() {
        let tree = rotlang::parse(
            "npc main() yap \
             alpha (1) yap based(1); yapity \
             omega (0) yap based(2); yapity \
             sigma yap based(3); yapity \
             micdrop 0; yapity",
        )
        .unwrap();

        let func = child(&tree, tree.root.unwrap(), 0);
        let body = child(&tree, func, 1);
        let if_node = child(&tree, body, 0);
        assert!(matches!(tree.kind(if_node), NodeKind::If));

        let cond = child(&tree, if_node, 0);
        assert_eq!(tree.kind(cond).as_num_lit(), Some(Literal::Int(1)));
        assert!(matches!(tree.kind(child(&tree, if_node, 1)), NodeKind::Block));

        let branch = child(&tree, if_node, 2);
        assert!(matches!(tree.kind(branch), NodeKind::Branch));
        assert_eq!(
            tree.kind(child(&tree, branch, 0)).as_num_lit(),
            Some(Literal::Int(0))
        );
        assert!(matches!(tree.kind(child(&tree, branch, 1)), NodeKind::Block));

        let else_node = child(&tree, branch, 2);
        assert!(matches!(tree.kind(else_node), NodeKind::Else));
        assert!(matches!(tree.kind(child(&tree, else_node, 0)), NodeKind::Block));

        let asm = rotlang::emit_asm(&tree).unwrap();
        assert_eq!(asm.matches("JMP :L_if_end_").count(), 2);
        assert_eq!(asm.matches(":L_if_next_").count(), 4); // 2 labels, each referenced once
    }

    /// The for loop desugars to
    /// `BLOCK { VAR_DECL; WHILE(i<3) BLOCK { COUT(i); ASSIGN } }` and
    /// compiles with a single back edge to the loop head.
    #[test]
    fn s6_for_desugars_and_compiles_as_while() {
        let tree = rotlang::parse(
            "npc main() yap \
             highkey (npc i gaslight 0; i < 3; i gaslight i + 1) based(i); \
             micdrop 0; yapity",
        )
        .unwrap();

        let func = child(&tree, tree.root.unwrap(), 0);
        let body = child(&tree, func, 1);

        let outer = child(&tree, body, 0);
        assert!(matches!(tree.kind(outer), NodeKind::Block));
        assert!(matches!(
            tree.kind(child(&tree, outer, 0)),
            NodeKind::VarDecl { .. }
        ));

        let while_node = child(&tree, outer, 1);
        assert!(matches!(tree.kind(while_node), NodeKind::While));
        assert!(matches!(
            tree.kind(child(&tree, while_node, 0)),
            NodeKind::Binary(TokenKind::Lt)
        ));

        let loop_body = child(&tree, while_node, 1);
        assert!(matches!(tree.kind(loop_body), NodeKind::Block));
        assert!(matches!(tree.kind(child(&tree, loop_body, 0)), NodeKind::Cout));
        assert!(matches!(
            tree.kind(child(&tree, loop_body, 1)),
            NodeKind::Assign { .. }
        ));

        let asm = rotlang::emit_asm(&tree).unwrap();
        assert_eq!(asm.matches("JMP :L_while_begin_").count(), 1);
    }
}

#[cfg(test)]
mod properties {
    use std::path::PathBuf;

    fn fixture(name: &str) -> anyhow::Result<String> {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("test_data")
            .join("rot")
            .join(name);
        Ok(std::fs::read_to_string(path)?)
    }

    #[test]
    fn east_round_trip_is_structural_identity() -> anyhow::Result<()> {
        for name in ["example.rot", "mixed_types.rot"] {
            let tree = rotlang::parse(&fixture(name)?)?;
            let east = rotlang::write_east(&tree);
            let back = rotlang::read_east(&east)?;
            assert!(tree.structural_eq(&back), "{name} failed the round trip");
        }
        Ok(())
    }

    #[test]
    fn east_round_trip_survives_optimization() -> anyhow::Result<()> {
        let mut tree = rotlang::parse(&fixture("mixed_types.rot")?)?;
        rotlang::optimize(&mut tree);
        let east = rotlang::write_east(&tree);
        let back = rotlang::read_east(&east)?;
        assert!(tree.structural_eq(&back));
        Ok(())
    }

    #[test]
    fn optimizer_is_idempotent_on_fixtures() -> anyhow::Result<()> {
        for name in ["example.rot", "mixed_types.rot"] {
            let mut tree = rotlang::parse(&fixture(name)?)?;
            rotlang::optimize(&mut tree);
            let once = rotlang::write_east(&tree);

            assert!(!rotlang::optimize(&mut tree), "{name}: second pass changed");
            assert_eq!(once, rotlang::write_east(&tree));
        }
        Ok(())
    }

    #[test]
    fn codegen_is_total_on_parsed_programs_with_main() -> anyhow::Result<()> {
        for name in ["example.rot", "mixed_types.rot"] {
            let tree = rotlang::parse(&fixture(name)?)?;
            let asm = rotlang::emit_asm(&tree)?;
            assert!(asm.contains("CALL :fn_main"), "{name} lost its entry call");
            assert!(asm.contains("HLT"));
        }
        Ok(())
    }

    #[test]
    fn unparse_output_reparses_to_equivalent_tree() -> anyhow::Result<()> {
        for name in ["example.rot", "mixed_types.rot"] {
            let tree = rotlang::parse(&fixture(name)?)?;
            let regenerated = rotlang::unparse(&tree)?;
            let back = rotlang::parse(&regenerated)?;
            assert!(tree.structural_eq(&back), "{name} failed unparse round trip");
        }
        Ok(())
    }

    #[test]
    fn pipeline_matches_direct_compilation() -> anyhow::Result<()> {
        // going through .east twice (front → mid → back) must produce the
        // same assembly as optimizing in memory
        let source = fixture("example.rot")?;

        let mut direct = rotlang::parse(&source)?;
        rotlang::optimize(&mut direct);
        let direct_asm = rotlang::emit_asm(&direct)?;

        let staged = {
            let tree = rotlang::parse(&source)?;
            let mut mid = rotlang::read_east(&rotlang::write_east(&tree))?;
            rotlang::optimize(&mut mid);
            let back = rotlang::read_east(&rotlang::write_east(&mid))?;
            rotlang::emit_asm(&back)?
        };

        assert_eq!(direct_asm, staged);
        Ok(())
    }
}
