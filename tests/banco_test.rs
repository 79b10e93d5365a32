use pesquisa_eleitoral::banco::{valor_categoria, valor_numerico, BancoEleitores, Registro};
use pesquisa_eleitoral::config::loader::CorrectionPlan;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

const TOTAL: usize = 400;

const PLANO: &str = r#"
semente: 2024
tolerancia: 1.0
faixas:
  - atributo: idade
    faixas:
      - { rotulo: "16-24", min: 16, max: 24, percentual: 15 }
      - { rotulo: "25-34", min: 25, max: 34, percentual: 20 }
      - { rotulo: "35-59", min: 35, max: 59, percentual: 45 }
      - { rotulo: "60+", min: 60, max: 120, percentual: 20 }
categoricos:
  - atributo: genero
    alvos:
      feminino: 52
      masculino: 48
  - atributo: regiao_administrativa
    tolerancia: 2.0
    alvos:
      Ceilândia: 40
      Taguatinga: 35
      Plano Piloto: 25
restricoes:
  - atributo: escolaridade
    valor: superior_completo
    idade_minima: 22
"#;

/// Skewed bank: 70% men, uniform ages, most voters in one region.
fn banco_enviesado() -> BancoEleitores {
    let mut rng = StdRng::seed_from_u64(99);
    let registros: Vec<Registro> = (0..TOTAL)
        .map(|i| {
            let idade: i64 = rng.gen_range(16..=90);
            let genero = if i % 10 < 7 { "masculino" } else { "feminino" };
            let regiao = match i % 5 {
                0..=2 => "Ceilândia",
                3 => "Taguatinga",
                _ => "Plano Piloto",
            };
            let escolaridade = if idade >= 22 && i % 3 == 0 {
                "superior_completo"
            } else {
                "medio_completo"
            };
            match json!({
                "id": format!("e-{:04}", i),
                "nome": format!("Eleitor {}", i),
                "idade": idade,
                "genero": genero,
                "regiao_administrativa": regiao,
                "escolaridade": escolaridade,
                "orientacao_politica": "centro"
            }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        })
        .collect();
    BancoEleitores::from_registros(registros)
}

fn plano() -> CorrectionPlan {
    CorrectionPlan::from_yaml(PLANO).unwrap()
}

#[test]
fn test_correction_reaches_targets() {
    let mut banco = banco_enviesado();
    let plano = plano();

    let antes = banco.relatorio(&plano);
    assert!(antes.iter().any(|r| !r.dentro_tolerancia));

    let relatorio = banco.aplicar_plano(&plano, None);
    assert_eq!(relatorio.semente, 2024);
    assert_eq!(relatorio.total_registros, TOTAL);
    assert!(relatorio.alterado());
    assert_ne!(relatorio.hash_antes, relatorio.hash_depois);

    let limite = 100.0 / TOTAL as f64 + 0.01;
    for atributo in &relatorio.depois {
        assert!(atributo.dentro_tolerancia, "{} still out of tolerance", atributo.atributo);
        for linha in &atributo.linhas {
            assert!(
                linha.desvio.abs() <= limite,
                "{} {}: {} pp",
                atributo.atributo,
                linha.categoria,
                linha.desvio
            );
        }
    }
    assert_eq!(banco.relatorio(&plano), relatorio.depois);
}

#[test]
fn test_correction_preserves_records() {
    let original = banco_enviesado();
    let mut banco = original.clone();
    banco.aplicar_plano(&plano(), None);

    assert_eq!(banco.len(), original.len());
    for (antes, depois) in original.registros().iter().zip(banco.registros()) {
        assert_eq!(antes["id"], depois["id"]);
        assert_eq!(antes["nome"], depois["nome"]);
        assert_eq!(antes["escolaridade"], depois["escolaridade"]);
        let idade = valor_numerico(depois, "idade").unwrap();
        assert!((16..=120).contains(&idade));
    }
}

#[test]
fn test_second_run_is_noop() {
    let mut banco = banco_enviesado();
    let plano = plano();
    let primeira = banco.aplicar_plano(&plano, None);

    let segunda = banco.aplicar_plano(&plano, Some(7));
    assert_eq!(segunda.total_alteracoes(), 0);
    assert!(!segunda.alterado());
    assert_eq!(segunda.hash_antes, primeira.hash_depois);
    assert_eq!(segunda.hash_depois, primeira.hash_depois);
}

#[test]
fn test_same_seed_same_output() {
    let plano = plano();
    let mut a = banco_enviesado();
    let mut b = banco_enviesado();

    let ra = a.aplicar_plano(&plano, Some(11));
    let rb = b.aplicar_plano(&plano, Some(11));
    assert_eq!(ra.hash_depois, rb.hash_depois);
    assert_eq!(a.registros(), b.registros());

    let mut c = banco_enviesado();
    let rc = c.aplicar_plano(&plano, Some(12));
    assert_eq!(rc.semente, 12);
    assert_eq!(rc.total_alteracoes(), ra.total_alteracoes());
}

#[test]
fn test_constraints_hold_after_correction() {
    let mut banco = banco_enviesado();
    let plano = plano();
    assert!(banco.validar(&plano.restricoes).is_empty());

    banco.aplicar_plano(&plano, None);
    assert!(banco.validar(&plano.restricoes).is_empty());

    for registro in banco.registros() {
        if valor_categoria(registro, "escolaridade") == "superior_completo" {
            assert!(valor_numerico(registro, "idade").unwrap() >= 22);
        }
    }
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let caminho = dir.path().join("banco.json");

    let mut banco = banco_enviesado();
    banco.save(&caminho, true).unwrap();
    // Nothing to back up on the first write.
    assert!(!dir.path().join("banco.json.bak").exists());

    let hash_original = banco.content_hash();
    banco.aplicar_plano(&plano(), None);
    banco.save(&caminho, true).unwrap();

    let recarregado = BancoEleitores::load(&caminho).unwrap();
    assert_eq!(recarregado.content_hash(), banco.content_hash());

    let backup = BancoEleitores::load(&dir.path().join("banco.json.bak")).unwrap();
    assert_eq!(backup.content_hash(), hash_original);
    assert!(!dir.path().join("banco.json.tmp").exists());
}

#[test]
fn test_load_rejects_non_array() {
    let dir = tempfile::tempdir().unwrap();
    let caminho = dir.path().join("banco.json");
    std::fs::write(&caminho, r#"{"eleitores": []}"#).unwrap();
    assert!(BancoEleitores::load(&caminho).is_err());

    assert!(BancoEleitores::load(&dir.path().join("inexistente.json")).is_err());
}

#[test]
fn test_bank_converts_to_database_rows() {
    let banco = banco_enviesado();
    let eleitores = banco.para_eleitores().unwrap();
    assert_eq!(eleitores.len(), TOTAL);
    assert_eq!(eleitores[0].atributos.get("id"), Some(&json!("e-0000")));
}
