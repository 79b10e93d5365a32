use chrono::Utc;
use pesquisa_eleitoral::database::models::*;
use pesquisa_eleitoral::error::PesquisaError;
use serde_json::json;

mod common;
use common::*;

async fn pesquisa_com_perguntas(db: &pesquisa_eleitoral::database::Database) -> (Pesquisa, Vec<PerguntaPesquisa>) {
    let pesquisa = db
        .create_pesquisa(
            &NovaPesquisa {
                titulo: "Governo do DF 2026".to_string(),
                descricao: None,
            },
            None,
        )
        .await
        .unwrap();

    let voto = db
        .add_pergunta(
            pesquisa.id,
            &NovaPergunta {
                texto: "Em quem você votaria?".to_string(),
                tipo: TipoPergunta::UnicaEscolha,
                opcoes: vec!["A".to_string(), "B".to_string(), "Branco".to_string()],
                obrigatoria: true,
                ordem: None,
            },
        )
        .await
        .unwrap();
    let nota = db
        .add_pergunta(
            pesquisa.id,
            &NovaPergunta {
                texto: "Nota para o governo atual".to_string(),
                tipo: TipoPergunta::Escala,
                opcoes: vec![],
                obrigatoria: false,
                ordem: None,
            },
        )
        .await
        .unwrap();

    (pesquisa, vec![voto, nota])
}

#[tokio::test]
async fn test_usuario_crud_and_bootstrap_admin() {
    let db = setup_test_db().await;

    assert!(db.ensure_admin("admin@example.com", "hash").await.unwrap());
    assert!(!db.ensure_admin("admin@example.com", "hash").await.unwrap());
    assert_eq!(db.count_admins_ativos().await.unwrap(), 1);

    let usuario = create_test_user(&db, "Pesquisador@Example.com", PapelUsuario::Pesquisador).await;
    assert_eq!(usuario.email, "pesquisador@example.com");

    let duplicado = db
        .create_usuario("pesquisador@example.com", "Outro", "hash", PapelUsuario::Visualizador)
        .await;
    assert!(matches!(duplicado, Err(PesquisaError::Conflict(_))));

    let atualizado = db
        .update_usuario(
            usuario.id,
            &AtualizacaoUsuario {
                nome: Some("Novo Nome".to_string()),
                papel: None,
                ativo: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(atualizado.nome, "Novo Nome");
    assert_eq!(atualizado.papel, PapelUsuario::Pesquisador);
    assert_eq!(atualizado.senha_hash, usuario.senha_hash);

    let com_senha = db
        .update_usuario(
            usuario.id,
            &AtualizacaoUsuario {
                nome: None,
                papel: Some(PapelUsuario::Visualizador),
                ativo: None,
            },
            Some("novo-hash"),
        )
        .await
        .unwrap();
    assert_eq!(com_senha.senha_hash, "novo-hash");
    assert_eq!(com_senha.papel, PapelUsuario::Visualizador);
    assert_eq!(com_senha.nome, "Novo Nome");

    let inexistente = db
        .update_usuario(999, &AtualizacaoUsuario::default(), Some("outro-hash"))
        .await;
    assert!(matches!(inexistente, Err(PesquisaError::NotFound(_))));

    db.deactivate_usuario(usuario.id).await.unwrap();
    assert!(!db.get_usuario(usuario.id).await.unwrap().ativo);
    assert!(matches!(db.get_usuario(999).await, Err(PesquisaError::NotFound(_))));
}

#[tokio::test]
async fn test_eleitores_filters_and_pagination() {
    let db = setup_test_db().await;
    for i in 0..5 {
        db.create_eleitor(&novo_eleitor(&format!("Ana {}", i), 20 + i, Genero::Feminino, OrientacaoPolitica::Esquerda))
            .await
            .unwrap();
    }
    for i in 0..3 {
        db.create_eleitor(&novo_eleitor(&format!("Bruno {}", i), 50 + i, Genero::Masculino, OrientacaoPolitica::Direita))
            .await
            .unwrap();
    }

    let filtro = FiltroEleitores {
        genero: Some(Genero::Feminino),
        ..Default::default()
    };
    assert_eq!(db.count_eleitores(&filtro).await.unwrap(), 5);

    let pagina = db
        .list_eleitores(&filtro, Paginacao::new(Some(2), Some(2)).unwrap())
        .await
        .unwrap();
    assert_eq!(pagina.len(), 2);
    assert_eq!(pagina[0].nome, "Ana 2");

    let filtro = FiltroEleitores {
        idade_min: Some(50),
        busca: Some("bru".to_string()),
        ..Default::default()
    };
    assert_eq!(db.count_eleitores(&filtro).await.unwrap(), 3);

    let distribuicao = db.distribuicao_eleitores("genero").await.unwrap();
    assert_eq!(distribuicao[0].categoria, "feminino");
    assert_eq!(distribuicao[0].percentual, 62.5);

    assert!(matches!(
        db.distribuicao_eleitores("senha").await,
        Err(PesquisaError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_eleitor_age_invariant() {
    let db = setup_test_db().await;
    let result = db
        .create_eleitor(&novo_eleitor("Jovem", 15, Genero::Outro, OrientacaoPolitica::Centro))
        .await;
    assert!(matches!(result, Err(PesquisaError::ValidationError(_))));
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let db = setup_test_db().await;
    let lote = vec![
        novo_eleitor("Válido", 30, Genero::Feminino, OrientacaoPolitica::Centro),
        novo_eleitor("Inválido", 130, Genero::Masculino, OrientacaoPolitica::Centro),
    ];

    let err = db.import_eleitores(&lote).await.unwrap_err();
    assert!(err.to_string().contains("Registro 1"));
    assert_eq!(db.count_eleitores(&FiltroEleitores::default()).await.unwrap(), 0);

    assert_eq!(db.import_eleitores(&lote[..1]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_candidato_numero_is_unique_per_cargo() {
    let db = setup_test_db().await;
    let novo = NovoCandidato {
        nome: "Candidata A".to_string(),
        partido: "abc".to_string(),
        numero: 10,
        cargo: "governador".to_string(),
    };
    let candidato = db.create_candidato(&novo).await.unwrap();
    assert_eq!(candidato.partido, "ABC");

    assert!(matches!(db.create_candidato(&novo).await, Err(PesquisaError::Conflict(_))));

    let outro_cargo = NovoCandidato {
        cargo: "senador".to_string(),
        ..novo
    };
    db.create_candidato(&outro_cargo).await.unwrap();
    assert_eq!(db.list_candidatos(Some("senador")).await.unwrap().len(), 1);
    assert_eq!(db.list_candidatos(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pesquisa_lifecycle() {
    let db = setup_test_db().await;
    let vazia = db
        .create_pesquisa(
            &NovaPesquisa {
                titulo: "Sem perguntas".to_string(),
                descricao: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(vazia.status, StatusPesquisa::Rascunho);
    assert!(matches!(
        db.set_status_pesquisa(vazia.id, StatusPesquisa::Ativa).await,
        Err(PesquisaError::ValidationError(_))
    ));

    let (pesquisa, perguntas) = pesquisa_com_perguntas(&db).await;
    assert_eq!(perguntas[0].ordem + 1, perguntas[1].ordem);
    assert!(matches!(
        db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Encerrada).await,
        Err(PesquisaError::Conflict(_))
    ));

    let ativa = db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Ativa).await.unwrap();
    assert!(ativa.iniciada_em.is_some());

    // Questions are frozen once fieldwork starts.
    assert!(matches!(
        db.delete_pergunta(pesquisa.id, perguntas[0].id).await,
        Err(PesquisaError::Conflict(_))
    ));
    assert!(matches!(db.delete_pesquisa(pesquisa.id).await, Err(PesquisaError::Conflict(_))));

    db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Pausada).await.unwrap();
    db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Ativa).await.unwrap();
    let encerrada = db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Encerrada).await.unwrap();
    assert!(encerrada.encerrada_em.is_some());
    assert_eq!(encerrada.iniciada_em, ativa.iniciada_em);
}

#[tokio::test]
async fn test_entrevistas_and_resultados() {
    let db = setup_test_db().await;
    let (pesquisa, perguntas) = pesquisa_com_perguntas(&db).await;
    let e1 = db
        .create_eleitor(&novo_eleitor("Ana", 30, Genero::Feminino, OrientacaoPolitica::Centro))
        .await
        .unwrap();
    let e2 = db
        .create_eleitor(&novo_eleitor("Bia", 40, Genero::Feminino, OrientacaoPolitica::Direita))
        .await
        .unwrap();

    let entrevista = |eleitor_id: i64, voto: &str, nota: serde_json::Value| NovaEntrevista {
        eleitor_id,
        respostas: vec![
            RespostaItem {
                pergunta_id: perguntas[0].id,
                valor: json!(voto),
            },
            RespostaItem {
                pergunta_id: perguntas[1].id,
                valor: nota,
            },
        ],
    };

    // Poll still in draft.
    assert!(matches!(
        db.registrar_entrevista(pesquisa.id, &entrevista(e1.id, "A", json!(7))).await,
        Err(PesquisaError::Conflict(_))
    ));
    db.set_status_pesquisa(pesquisa.id, StatusPesquisa::Ativa).await.unwrap();

    assert_eq!(db.registrar_entrevista(pesquisa.id, &entrevista(e1.id, "A", json!(7))).await.unwrap(), 2);
    assert_eq!(db.registrar_entrevista(pesquisa.id, &entrevista(e2.id, "B", json!(null))).await.unwrap(), 1);

    assert!(matches!(
        db.registrar_entrevista(pesquisa.id, &entrevista(e1.id, "B", json!(3))).await,
        Err(PesquisaError::Conflict(_))
    ));
    assert!(matches!(
        db.registrar_entrevista(pesquisa.id, &entrevista(999, "A", json!(1))).await,
        Err(PesquisaError::NotFound(_))
    ));

    let resultado = db.resultados_pesquisa(pesquisa.id).await.unwrap();
    assert_eq!(resultado.total_entrevistados, 2);
    let opcoes = resultado.perguntas[0].opcoes.as_ref().unwrap();
    assert_eq!(opcoes[0].categoria, "A");
    assert_eq!(opcoes[0].percentual, 50.0);
    let escala = resultado.perguntas[1].escala.as_ref().unwrap();
    assert_eq!(escala.media, 7.0);

    assert_eq!(db.list_respostas(pesquisa.id, Some(e2.id)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_whatsapp_messages_are_idempotent() {
    let db = setup_test_db().await;
    let contato = db.upsert_contato("5561999990000", Some("Maria")).await.unwrap();
    assert!(contato.opt_in);

    let again = db.upsert_contato("5561999990000", None).await.unwrap();
    assert_eq!(again.id, contato.id);
    assert_eq!(again.nome.as_deref(), Some("Maria"));

    let agora = Utc::now();
    assert!(db
        .registrar_mensagem(contato.id, DirecaoMensagem::Entrada, Some("wamid.1"), "Oi", agora)
        .await
        .unwrap());
    assert!(!db
        .registrar_mensagem(contato.id, DirecaoMensagem::Entrada, Some("wamid.1"), "Oi", agora)
        .await
        .unwrap());
    assert_eq!(db.list_mensagens(contato.id, 10).await.unwrap().len(), 1);
    assert!(db.get_contato(contato.id).await.unwrap().ultima_mensagem_em.is_some());

    let eleitor = db
        .create_eleitor(&novo_eleitor("Maria", 33, Genero::Feminino, OrientacaoPolitica::Centro))
        .await
        .unwrap();
    let vinculado = db.vincular_eleitor(contato.id, Some(eleitor.id)).await.unwrap();
    assert_eq!(vinculado.eleitor_id, Some(eleitor.id));

    db.set_opt_in(contato.id, false).await.unwrap();
    assert!(db.list_contatos(true).await.unwrap().is_empty());
    assert_eq!(db.list_contatos(false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_opt_out_commits_with_its_message() {
    let db = setup_test_db().await;
    let contato = db.upsert_contato("5561999990000", None).await.unwrap();
    let agora = Utc::now();

    // Audit table missing: the whole delivery must roll back.
    sqlx::query("ALTER TABLE eventos_auditoria RENAME TO eventos_auditoria_off")
        .execute(db.pool())
        .await
        .unwrap();
    assert!(db
        .registrar_mensagem_entrada(contato.id, "wamid.sair", "SAIR", agora, Some(false))
        .await
        .is_err());
    assert!(db.list_mensagens(contato.id, 10).await.unwrap().is_empty());
    assert!(db.get_contato(contato.id).await.unwrap().opt_in);

    sqlx::query("ALTER TABLE eventos_auditoria_off RENAME TO eventos_auditoria")
        .execute(db.pool())
        .await
        .unwrap();

    // Redelivery applies the keyword.
    assert!(db
        .registrar_mensagem_entrada(contato.id, "wamid.sair", "SAIR", agora, Some(false))
        .await
        .unwrap());
    assert!(!db.get_contato(contato.id).await.unwrap().opt_in);
    assert_eq!(db.list_mensagens(contato.id, 10).await.unwrap().len(), 1);
    assert_eq!(db.list_eventos(10).await.unwrap()[0].tipo, "whatsapp_opt_out");

    // A duplicate never toggles again.
    db.set_opt_in(contato.id, true).await.unwrap();
    assert!(!db
        .registrar_mensagem_entrada(contato.id, "wamid.sair", "SAIR", agora, Some(false))
        .await
        .unwrap());
    assert!(db.get_contato(contato.id).await.unwrap().opt_in);
}

#[tokio::test]
async fn test_audit_events_newest_first() {
    let db = setup_test_db().await;
    db.log_evento("primeiro", None, &json!({})).await.unwrap();
    db.log_evento("segundo", None, &json!({ "x": 1 })).await.unwrap();

    let eventos = db.list_eventos(10).await.unwrap();
    assert_eq!(eventos.len(), 2);
    assert_eq!(eventos[0].tipo, "segundo");
    assert_eq!(eventos[0].detalhes.0["x"], 1);
}
