//! FQ-CoDel 接口仿真
//!
//! 运行一个场景（JSON 文件，或由命令行参数生成的"若干轻流 + 一个重流"），
//! 输出接口与各流的统计（JSON）。

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fqcodel_rs::net::{ClassId, Protocol};
use fqcodel_rs::queue::FqConfig;
use fqcodel_rs::sim::{FlowSpec, ScenarioSpec, run_scenario};

#[derive(Debug, Parser)]
#[command(name = "fq_sim", about = "FQ-CoDel 接口仿真：多流共享一条出口链路")]
struct Args {
    /// 场景文件（JSON）；给出时忽略下面的流参数
    #[arg(long)]
    scenario: Option<PathBuf>,
    /// 轻流数量
    #[arg(long, default_value_t = 3)]
    light_flows: u32,
    /// 轻流注入间隔（微秒）
    #[arg(long, default_value_t = 1_000)]
    light_gap_us: u64,
    /// 重流注入间隔（微秒）
    #[arg(long, default_value_t = 60)]
    heavy_gap_us: u64,
    /// 重流由本机 socket 发出（可接收流控通告）
    #[arg(long, default_value_t = false)]
    heavy_from_socket: bool,
    #[arg(long, default_value_t = 1500)]
    pkt_bytes: u32,
    #[arg(long, default_value_t = 100)]
    link_mbps: u64,
    /// 接口总包数上限
    #[arg(long, default_value_t = 1024)]
    pkt_drop_limit: u32,
    /// 仿真运行到多少毫秒
    #[arg(long, default_value_t = 500)]
    until_ms: u64,
    /// 结果写入文件而不是标准输出
    #[arg(long)]
    out: Option<PathBuf>,
}

fn build_scenario(args: &Args) -> ScenarioSpec {
    let mut flows: Vec<FlowSpec> = (0..args.light_flows)
        .map(|i| FlowSpec {
            flow_hash: 0x100 + i,
            class: ClassId(1),
            proto: Protocol::Tcp,
            from_socket: true,
            pkt_bytes: args.pkt_bytes,
            gap_us: args.light_gap_us,
            start_us: u64::from(i) * 10,
            bursts: None,
            chain: 1,
            comp_gen_run: 0,
        })
        .collect();
    flows.push(FlowSpec {
        flow_hash: 0xbeef,
        class: ClassId(1),
        proto: Protocol::Udp,
        from_socket: args.heavy_from_socket,
        pkt_bytes: args.pkt_bytes,
        gap_us: args.heavy_gap_us,
        start_us: 0,
        bursts: None,
        chain: 1,
        comp_gen_run: 0,
    });
    ScenarioSpec {
        schema_version: 1,
        fq: FqConfig {
            pkt_drop_limit: args.pkt_drop_limit,
            ..FqConfig::default()
        },
        link_mbps: args.link_mbps,
        until_ms: args.until_ms,
        pool_limit: None,
        flows,
    }
}

fn main() -> ExitCode {
    // 初始化 tracing（写到 stderr，stdout 只留给结果）
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let spec = match &args.scenario {
        Some(path) => {
            let raw = match fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(err) => {
                    eprintln!("failed to read {}: {err}", path.display());
                    return ExitCode::from(2);
                }
            };
            match ScenarioSpec::from_json_str(&raw) {
                Ok(spec) => spec,
                Err(err) => {
                    eprintln!("invalid scenario {}: {err}", path.display());
                    return ExitCode::from(2);
                }
            }
        }
        None => build_scenario(&args),
    };

    let report = match run_scenario(&spec) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("scenario rejected: {err}");
            return ExitCode::from(2);
        }
    };

    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(err) => {
            eprintln!("failed to encode report: {err}");
            return ExitCode::FAILURE;
        }
    };
    match &args.out {
        Some(path) => {
            if let Err(err) = fs::write(path, json) {
                eprintln!("failed to write {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
            eprintln!("wrote report to {}", path.display());
        }
        None => println!("{json}"),
    }
    ExitCode::SUCCESS
}
