use std::time::Instant;

use clap::Args;
use tandem_executor::Executor;
use tandem_vector::{add, outer};

use super::Command;

// Above this, operands and results are too large to be worth printing.
const PRINT_LIMIT: usize = 100;

/// Subcommand for timing parallel vector sum and outer product.
#[derive(Debug, Args)]
pub struct Vector {
    /// The number of elements in each operand vector.
    #[clap(default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    dimension: u32,

    /// The number of worker threads to split computations across.
    ///
    /// Defaults to the available parallelism of the system.
    #[clap(short = 'j', long, env = "TANDEM_WORKER_THREADS", value_parser = clap::value_parser!(u32).range(1..))]
    workers: Option<u32>,
}

impl Command for Vector {
    fn handle(self) -> eyre::Result<()> {
        let ex = match self.workers {
            Some(n) => Executor::new(n as usize),
            None => Executor::get()?,
        };

        let dimension = self.dimension as usize;
        let a: Vec<f64> = (0..dimension).map(|i| i as f64 + 1.0).collect();
        let b: Vec<f64> = (0..dimension).map(|i| i as f64 + 2.0).collect();

        println!(
            "Computation is performed on {} processor core(s):",
            ex.workers()
        );

        let start = Instant::now();
        let sum = add(&ex, &a, &b)?;
        println!("a + b took {}ms to compute.", start.elapsed().as_millis());

        let start = Instant::now();
        let product = outer(&ex, &a, &b)?;
        println!("a x b took {}ms to compute.", start.elapsed().as_millis());

        if dimension <= PRINT_LIMIT {
            println!("a = {a:?}");
            println!("b = {b:?}");
            println!("a + b = {sum:?}");
            println!("a x b = {product}");
        }

        Ok(())
    }
}
