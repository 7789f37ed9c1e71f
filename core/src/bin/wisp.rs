/*
 * Copyright (c) 2026 the Wisp project contributors.
 *
 * This file is part of the Wisp intent engine.
 *
 * LICENSE: MIT
 */

use std::fs;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;
use wisp_core::{Engine, EngineConfig, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = match Engine::new(EngineConfig::from_env()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Engine startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    match args.get(1) {
        Some(path) => run_file(&mut engine, path),
        None => repl(&mut engine),
    }
}

fn run_file(engine: &mut Engine, path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    match engine.evaluate_program(&source) {
        Ok(out) => {
            for line in &out.printed {
                println!("{}", line);
            }
            if out.value != Value::Nil {
                println!("{}", out.value);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn repl(engine: &mut Engine) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("wisp (exit with ctrl-d)");
    loop {
        print!("> ");
        let _ = stdout.flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }
        match engine.evaluate_program(&line) {
            Ok(out) => {
                for printed in &out.printed {
                    println!("{}", printed);
                }
                println!("{}", out.value);
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}
