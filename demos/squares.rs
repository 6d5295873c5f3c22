use gather_pool::{args, Args, GatherPool, PoolOptions};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

fn square(a: Args) -> i64 {
  match a.int(0) {
    Ok(i) => i * i,
    Err(e) => {
      tracing::error!("square: {}", e);
      -1
    }
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Squares Example ---");

  let pool = GatherPool::<i64>::new(PoolOptions::new().name("squares_pool"), Handle::current());

  for i in 0..10 {
    if i % 2 == 0 {
      pool.submit(square, args![i]);
    } else {
      // Odd inputs take a detour through an async worker.
      pool.submit_async(
        |a: Args| async move {
          tokio::time::sleep(Duration::from_millis(50)).await;
          square(a)
        },
        args![i],
      );
    }
  }

  info!("All workers submitted. Collecting results as they complete...");
  let mut results = match pool.collect() {
    Ok(results) => results,
    Err(e) => {
      tracing::error!("Failed to collect results: {}", e);
      return;
    }
  };

  let mut sum = 0;
  while let Some(value) = results.next_result().await {
    info!("Got {}", value);
    sum += value;
  }
  info!("Received {} squares summing to {}", results.received(), sum);
  info!("--- Squares Example End ---");
}
