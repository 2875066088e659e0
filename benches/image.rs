use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ratc::backend::config::OutputConfig;
use ratc::backend::defs::avr::Op;
use ratc::backend::model::{Instruction, Operand, Relocation};
use ratc::backend::phases::types::Loc;
use ratc::backend::Generator;

// A 32 KiB flash worth of short loops.
fn filled_flash() -> Generator {
    let here = Loc::new(1, 1);
    let mut gen = Generator::new();

    for i in 0..4096 {
        let name = format!("l{}", i);
        gen.label(&name, here).unwrap();
        gen.emit(
            here,
            Instruction::Avr(Op::Ldi),
            vec![Operand::Number(16), Operand::Number(i % 256)],
        );
        gen.emit(
            here,
            Instruction::Avr(Op::Brne),
            vec![Operand::label(&name, Relocation::RelativeWord)],
        );
        gen.emit(
            here,
            Instruction::Avr(Op::Jmp),
            vec![Operand::label(&name, Relocation::AbsoluteWord)],
        );
    }

    gen
}

fn image_hex(c: &mut Criterion) {
    let config = OutputConfig::default();

    c.bench_function("resolve+hex", |b| {
        b.iter_batched(
            filled_flash,
            |gen| {
                let mut out = Vec::new();
                gen.finish().unwrap().write_hex(&config, &mut out).unwrap();
                out
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, image_hex);
criterion_main!(benches);
