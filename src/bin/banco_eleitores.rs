//! Voter bank tool
//!
//! Inspects, corrects, validates and imports the JSON voter bank using YAML
//! correction plans.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pesquisa_eleitoral::banco::{BancoEleitores, RelatorioAtributo, RelatorioCorrecao};
use pesquisa_eleitoral::config::loader::{CorrectionPlan, Faixa};
use pesquisa_eleitoral::config::AppConfig;
use pesquisa_eleitoral::database::models::ContagemCategoria;
use pesquisa_eleitoral::database::Database;

#[derive(Parser)]
#[command(name = "banco-eleitores")]
#[command(about = "Inspect and correct the synthetic voter bank")]
struct Cli {
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the distribution of one attribute
    Distribuicao {
        /// Voter bank JSON file
        #[arg(short, long)]
        banco: PathBuf,

        /// Attribute name
        #[arg(short, long)]
        atributo: String,

        /// Numeric bands, e.g. 16-24,25-34,35-59,60-120
        #[arg(short, long)]
        faixas: Option<String>,
    },
    /// Compare the bank with the targets of a correction plan
    Relatorio {
        #[arg(short, long)]
        banco: PathBuf,

        /// Correction plan YAML file
        #[arg(short, long)]
        plano: PathBuf,
    },
    /// Apply a correction plan
    Corrigir {
        #[arg(short, long)]
        banco: PathBuf,

        #[arg(short, long)]
        plano: PathBuf,

        /// Output file (defaults to overwriting the bank)
        #[arg(short, long)]
        saida: Option<PathBuf>,

        /// Seed overriding the plan's
        #[arg(long)]
        semente: Option<u64>,

        /// Report the changes without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Do not keep a .bak copy of the overwritten file
        #[arg(long)]
        sem_backup: bool,
    },
    /// Check age bounds and the plan's constraints
    Validar {
        #[arg(short, long)]
        banco: PathBuf,

        #[arg(short, long)]
        plano: Option<PathBuf>,
    },
    /// Import the bank into the database
    Importar {
        #[arg(short, long)]
        banco: PathBuf,

        /// Database URL (defaults to the server configuration)
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pesquisa_eleitoral=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Distribuicao { banco, atributo, faixas } => {
            let banco = BancoEleitores::load(&banco)?;
            let distribuicao = match faixas {
                Some(lista) => banco.distribuicao_faixas(&atributo, &Faixa::parse_lista(&lista)?),
                None => banco.distribuicao(&atributo),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&distribuicao)?);
            } else {
                imprimir_distribuicao(&atributo, banco.len(), &distribuicao);
            }
        }
        Commands::Relatorio { banco, plano } => {
            let banco = BancoEleitores::load(&banco)?;
            let plano = CorrectionPlan::load(&plano)?;
            let relatorio = banco.relatorio(&plano);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&relatorio)?);
            } else {
                imprimir_relatorio(&relatorio);
            }
        }
        Commands::Corrigir {
            banco: caminho,
            plano,
            saida,
            semente,
            dry_run,
            sem_backup,
        } => {
            let mut banco = BancoEleitores::load(&caminho)?;
            let plano = CorrectionPlan::load(&plano)?;
            let relatorio = banco.aplicar_plano(&plano, semente);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&relatorio)?);
            } else {
                imprimir_correcao(&relatorio);
            }

            if dry_run {
                info!("Dry run: nothing written");
            } else if !relatorio.alterado() && saida.is_none() {
                info!("Bank already matches the plan; nothing written");
            } else {
                let destino = saida.unwrap_or(caminho);
                banco
                    .save(&destino, !sem_backup)
                    .with_context(|| format!("Failed to write {:?}", destino))?;
            }
        }
        Commands::Validar { banco, plano } => {
            let banco = BancoEleitores::load(&banco)?;
            let restricoes = match plano {
                Some(path) => CorrectionPlan::load(&path)?.restricoes,
                None => Vec::new(),
            };
            let violacoes = banco.validar(&restricoes);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&violacoes)?);
            } else {
                for v in &violacoes {
                    println!(
                        "❌ registro {} ({}): {}",
                        v.indice,
                        v.id.as_deref().unwrap_or("-"),
                        v.motivo
                    );
                }
            }

            if !violacoes.is_empty() {
                eprintln!("{} violation(s) in {} records", violacoes.len(), banco.len());
                std::process::exit(1);
            }
            if !cli.json {
                println!("✅ {} records valid", banco.len());
            }
        }
        Commands::Importar { banco, database_url } => {
            let banco = BancoEleitores::load(&banco)?;
            let lote = banco.para_eleitores()?;

            let url = match database_url {
                Some(url) => url,
                None => AppConfig::load()?.database_url,
            };
            let database = Database::new(&url).await?;
            database.run_migrations().await?;

            let importados = database.import_eleitores(&lote).await?;
            if importados != banco.len() {
                bail!("Imported {} of {} records", importados, banco.len());
            }
            println!("✅ Imported {} eleitores ({})", importados, banco.content_hash());
        }
    }

    Ok(())
}

fn imprimir_distribuicao(atributo: &str, total: usize, linhas: &[ContagemCategoria]) {
    println!("{} ({} records)", atributo, total);
    for linha in linhas {
        println!(
            "  {:<36} {:>7} {:>7.2}%",
            linha.categoria, linha.total, linha.percentual
        );
    }
}

fn imprimir_relatorio(relatorio: &[RelatorioAtributo]) {
    for atributo in relatorio {
        let marca = if atributo.dentro_tolerancia { "✅" } else { "⚠️" };
        println!(
            "{} {} (max deviation {:.2} pp, tolerance {:.2} pp)",
            marca, atributo.atributo, atributo.desvio_maximo, atributo.tolerancia
        );
        for linha in &atributo.linhas {
            println!(
                "  {:<36} {:>7} {:>7.2}%  target {:>6.2}%  {:>+7.2} pp",
                linha.categoria, linha.total, linha.observado, linha.alvo, linha.desvio
            );
        }
    }
}

fn imprimir_correcao(relatorio: &RelatorioCorrecao) {
    println!(
        "Seed {} | {} records | {} change(s)",
        relatorio.semente,
        relatorio.total_registros,
        relatorio.total_alteracoes()
    );
    for correcao in &relatorio.correcoes {
        if correcao.dentro_tolerancia {
            println!("  {}: within tolerance", correcao.atributo);
            continue;
        }
        println!("  {}: {} change(s)", correcao.atributo, correcao.alteracoes.len());
        for pendencia in &correcao.pendencias {
            println!(
                "    ⚠️ {} still {} short (constraints)",
                pendencia.categoria, pendencia.faltando
            );
        }
    }
    println!();
    imprimir_relatorio(&relatorio.depois);
    println!("{} -> {}", relatorio.hash_antes, relatorio.hash_depois);
}
