use criterion::{criterion_group, criterion_main, Criterion};
use playfs_vfs::{Fs, Layout, OpenFlags};

fn run_benchmarks(c: &mut Criterion) {
    let chunk_sizes = [1, 64, 4096];
    for size in chunk_sizes {
        let chunk = vec![b'x'; size];
        c.bench_function(&format!("append {size}-byte chunks"), |b| {
            b.iter(|| {
                let mut fs = Fs::new(Layout::default()).unwrap();
                let fd = fs
                    .open("/tmp/out", OpenFlags::WRONLY | OpenFlags::CREATE, 0o644)
                    .unwrap();
                // Enough writes to cross several capacity doublings
                for _ in 0..(1 << 20) / size {
                    std::hint::black_box(fs.write_all(fd, &chunk).unwrap());
                }
            })
        });
    }

    c.bench_function("readdir support tree", |b| {
        let mut fs = Fs::new(Layout::default()).unwrap();
        for pkg in 0..200 {
            for file in 0..20 {
                fs.seed(&format!("/go/src/pkg{pkg}/file{file}.go"), "package x")
                    .unwrap();
            }
        }
        b.iter(|| std::hint::black_box(fs.readdir("/go/src").unwrap()))
    });
}

criterion_group!(benches, run_benchmarks);
criterion_main!(benches);
