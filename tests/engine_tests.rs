use sim6809::opcodes::{decode, lookup, modes};
use sim6809::{AddressingMode, AsmParser, ErrorKind, Halt, Mnemonic, Register, RunState, Simulator};

fn load(src: &str) -> RunState {
    let air = AsmParser::new(src).unwrap().parse().unwrap();
    RunState::new(air)
}

/// An operand written in the shape that selects `mode`.
fn operand_for(mnemonic: Mnemonic, mode: AddressingMode) -> &'static str {
    match mode {
        AddressingMode::Inherent => "",
        AddressingMode::Immediate if mnemonic.immediate_width() == 2 => "#$1234",
        AddressingMode::Immediate => "#$12",
        AddressingMode::Direct => "$10",
        AddressingMode::Extended => "$1234",
        AddressingMode::Indexed => "5,X",
        AddressingMode::Relative => "HERE",
        AddressingMode::RegisterPair => "A,B",
    }
}

/// Encodings shared with another entry decode to that entry instead.
fn is_alias(mnemonic: Mnemonic, mode: AddressingMode) -> bool {
    mnemonic == Mnemonic::End
        || (matches!(mnemonic, Mnemonic::Jmp | Mnemonic::Jsr) && mode == AddressingMode::Relative)
}

#[test]
fn encode_then_decode_round_trips() {
    for &mnemonic in Mnemonic::ALL {
        for mode in modes(mnemonic) {
            let src = format!("HERE: {} {}\nEND", mnemonic, operand_for(mnemonic, mode));
            let air = AsmParser::new(&src)
                .and_then(|parser| parser.parse())
                .unwrap_or_else(|err| panic!("`{src}` failed: {err}"));
            let state = RunState::new(air);
            let first = state.air().get(0).unwrap();

            let decoded = decode(state.program(), first.address)
                .unwrap_or_else(|| panic!("`{src}` did not decode"));
            assert_eq!(decoded.len, first.size, "length of `{src}`");
            assert_eq!(
                lookup(decoded.mnemonic, decoded.mode),
                lookup(mnemonic, mode),
                "opcode of `{src}`"
            );
            if !is_alias(mnemonic, mode) {
                assert_eq!((decoded.mnemonic, decoded.mode), (mnemonic, mode), "`{src}`");
            }
        }
    }
}

#[test]
fn immediate_load() {
    let mut state = load("LDA #$10\nEND");
    assert_eq!(state.air().get(0).unwrap().bytes, vec![0x86, 0x10]);
    state.step().unwrap();
    assert_eq!(state.reg(Register::A), 0x10);
    assert!(!state.flags().z);
    assert!(!state.flags().n);
}

#[test]
fn add_carries() {
    let mut state = load("ADDA #$FF\nEND");
    state.set_reg(Register::A, 0x01);
    state.step().unwrap();
    assert_eq!(state.reg(Register::A), 0x00);
    assert!(state.flags().c);
    assert!(state.flags().z);
}

#[test]
fn subtract_borrows() {
    let mut state = load("SUBA #$01\nEND");
    state.step().unwrap();
    assert_eq!(state.reg(Register::A), 0xFF);
    assert!(state.flags().c);
    assert!(state.flags().n);
}

#[test]
fn loop_falls_through_after_wrapping() {
    let mut state = load("LOOP: INCA\nBNE LOOP\nEND");
    state.set_reg(Register::A, 0xFE);
    assert_eq!(state.run().unwrap(), Halt::End);
    assert_eq!(state.reg(Register::A), 0x00);
    assert!(state.flags().z);
    // Two passes of INCA and BNE, then END
    assert_eq!(state.steps(), 5);
}

#[test]
fn missing_end_leaves_nothing_assembled() {
    let mut sim = Simulator::with_source("LDA #$01\nSTA $10\n\n");
    let err = sim.assemble().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingEnd);
    assert!(sim.air().is_none());
}

#[test]
fn transfer_and_exchange() {
    let mut state = load("TFR A,B\nEXG A,B\nEND");
    state.set_reg(Register::A, 0x11);
    state.set_reg(Register::B, 0x22);
    state.step().unwrap();
    assert_eq!(state.reg(Register::A), 0x11);
    assert_eq!(state.reg(Register::B), 0x11);

    state.set_reg(Register::B, 0x33);
    state.step().unwrap();
    assert_eq!(state.reg(Register::A), 0x33);
    assert_eq!(state.reg(Register::B), 0x11);
}

#[test]
fn undeclared_label_blocks_assembly() {
    let err = AsmParser::new("LDA #$01\nBEQ NOWHERE\nEND")
        .and_then(|parser| parser.parse())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LabelNotFound);
    assert_eq!(err.line, Some(2));
}

#[test]
fn direct_stores_use_the_direct_page() {
    let mut state = load("LDA #$20\nTFR A,DP\nLDB #$5A\nSTB $04\nEND");
    state.run().unwrap();
    assert_eq!(state.data().read(0x2004), 0x5A);
    assert_eq!(state.data().read(0x0004), 0x00);
}

#[test]
fn counts_down_with_compare() {
    let src = "\
        LDA #$05
    LOOP:
        DECA
        INCB
        CMPA #$00
        BNE LOOP
        STB $0000
        END";
    let mut sim = Simulator::with_source(src);
    let snapshot = sim.run().unwrap();
    assert_eq!(snapshot.registers.b, 5);
    assert_eq!(snapshot.writes, vec![(0x0000, 0x05)]);
    assert_eq!(sim.halt_reason(), Some(Halt::End));
}

#[test]
fn conditional_branches_follow_flags() {
    // Branch, its opcode, then code that makes it taken and code that makes it fall through
    let cases: &[(&str, u8, &str, &str)] = &[
        ("BCC", 0x24, "ADDA #$01", "SUBA #$01"),
        ("BCS", 0x25, "SUBA #$01", "ADDA #$01"),
        ("BNE", 0x26, "LDA #$01", "LDA #$00"),
        ("BEQ", 0x27, "LDA #$00", "LDA #$01"),
        ("BVC", 0x28, "LDA #$01\nADDA #$01", "LDA #$7F\nADDA #$01"),
        ("BVS", 0x29, "LDA #$7F\nADDA #$01", "LDA #$01\nADDA #$01"),
        ("BPL", 0x2A, "LDA #$01", "LDA #$80"),
        ("BMI", 0x2B, "LDA #$80", "LDA #$01"),
    ];
    for &(branch, opcode, taken, not_taken) in cases {
        for (setup, expect_taken) in [(taken, true), (not_taken, false)] {
            let src = format!("{setup}\n{branch} SKIP\nINCB\nSKIP: END");
            let mut state = load(&src);
            let at = setup.lines().count();
            assert_eq!(state.air().get(at).unwrap().bytes[0], opcode, "`{branch}` opcode");

            assert_eq!(state.run().unwrap(), Halt::End);
            let skipped = state.reg(Register::B) == 0;
            assert_eq!(skipped, expect_taken, "`{branch}` after `{setup}`");
        }
    }
}
