use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{
        cache_aside::CacheAside,
        comments::CommentsService,
        content::ContentService,
        error::AppError,
        gateways::{Authenticator, KvStore, Mailer, RateLimiter},
        guestbook::{GuestbookService, NotificationSettings},
        repos::{CommentsRepo, ContentSource, GuestbookRepo},
        sitemap::{RobotsRules, SitemapService},
        syndication::SyndicationService,
    },
    config::{self, RateLimitSettings},
    domain::site::SiteProfile,
    infra::{
        auth::SessionAuthenticator,
        cms::HttpContentSource,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, HttpState, RouterState},
        kv::RedisKvStore,
        mail::{HttpMailer, LogMailer},
        memory::{
            MemoryCommentsRepo, MemoryContentSource, MemoryGuestbookRepo, MemoryKvStore,
            StaticAuthenticator,
        },
        rate_limit::{RedisRateLimiter, SlidingWindowLimiter},
        telemetry,
    },
};

const TARGET: &str = "vitrine::serve";
const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match cli_args.command {
        None | Some(config::Command::Serve(_)) => run_serve(settings).await,
        Some(config::Command::Migrate(_)) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    info!(target = "vitrine::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let router_state = build_router_state(&settings).await?;
    let router = http::build_router(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = TARGET,
        addr = %settings.server.public_addr,
        "listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut server_task: JoinHandle<std::io::Result<()>> =
        tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => return server_outcome(result),
        () = shutdown_signal() => {}
    }

    info!(
        target = TARGET,
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested; draining connections"
    );
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server_task).await {
        Ok(result) => server_outcome(result),
        Err(_) => {
            warn!(target = TARGET, "graceful shutdown timed out; aborting open connections");
            server_task.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = TARGET, error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(target = TARGET, error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

struct Storage {
    kv: Arc<dyn KvStore>,
    read_limiter: Arc<dyn RateLimiter>,
    write_limiter: Arc<dyn RateLimiter>,
}

async fn init_storage(settings: &config::Settings) -> Result<Storage, AppError> {
    let read = &settings.guestbook.read;
    let write = &settings.guestbook.write;

    let Some(redis_url) = settings.cache.redis_url.as_deref() else {
        warn!(
            target = TARGET,
            "no redis url configured; caching, view counts and rate limits stay in process"
        );
        return Ok(Storage {
            kv: Arc::new(MemoryKvStore::default()),
            read_limiter: Arc::new(sliding_limiter(read)),
            write_limiter: Arc::new(sliding_limiter(write)),
        });
    };

    let store = RedisKvStore::connect(redis_url).await?;
    let manager = store.manager();
    Ok(Storage {
        read_limiter: Arc::new(RedisRateLimiter::new(
            manager.clone(),
            read.window(),
            read.max_requests.get(),
        )),
        write_limiter: Arc::new(RedisRateLimiter::new(
            manager,
            write.window(),
            write.max_requests.get(),
        )),
        kv: Arc::new(store),
    })
}

fn sliding_limiter(limits: &RateLimitSettings) -> SlidingWindowLimiter {
    SlidingWindowLimiter::new(limits.window(), limits.max_requests.get())
}

fn init_content(settings: &config::Settings) -> Result<Arc<dyn ContentSource>, AppError> {
    match settings.content.api_url.clone() {
        Some(api_url) => {
            let source = HttpContentSource::new(
                api_url,
                settings.content.token.clone(),
                settings.content.request_timeout,
            )
            .map_err(|err| AppError::unexpected(format!("content client: {err}")))?;
            Ok(Arc::new(source))
        }
        None => {
            warn!(target = TARGET, "no content api configured; serving an empty blog");
            Ok(Arc::new(MemoryContentSource::new(Vec::new())))
        }
    }
}

async fn init_database(
    settings: &config::Settings,
) -> Result<Option<Arc<PostgresRepositories>>, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        warn!(
            target = TARGET,
            "no database url configured; guestbook and comments are kept in memory"
        );
        return Ok(None);
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Some(Arc::new(PostgresRepositories::new(pool))))
}

fn init_authenticator(settings: &config::Settings) -> Result<Arc<dyn Authenticator>, AppError> {
    match settings.auth.session_url.clone() {
        Some(session_url) => {
            let authenticator =
                SessionAuthenticator::new(session_url, settings.auth.request_timeout)
                    .map_err(|err| AppError::unexpected(format!("auth client: {err}")))?;
            Ok(Arc::new(authenticator))
        }
        None => {
            warn!(
                target = TARGET,
                "no session endpoint configured; every caller is anonymous"
            );
            Ok(Arc::new(StaticAuthenticator::default()))
        }
    }
}

fn init_mailer(settings: &config::Settings) -> Result<Arc<dyn Mailer>, AppError> {
    match settings.mail.transport.as_ref() {
        Some(transport) => {
            let mailer = HttpMailer::new(
                transport.api_url.clone(),
                transport.api_key.clone(),
                settings.mail.from.clone(),
                MAIL_TIMEOUT,
            )
            .map_err(|err| AppError::unexpected(format!("mail client: {err}")))?;
            Ok(Arc::new(mailer))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

fn site_profile(settings: &config::Settings) -> SiteProfile {
    let site = &settings.site;
    SiteProfile::new(site.url.as_str(), site.title.clone(), site.description.clone())
        .with_image(site.image_url.clone())
        .with_language(site.language.clone())
        .with_author(site.author.clone())
}

async fn build_router_state(settings: &config::Settings) -> Result<RouterState, AppError> {
    let site = Arc::new(site_profile(settings));
    let storage = init_storage(settings).await?;
    let content = init_content(settings)?;
    let db = init_database(settings).await?;
    let authenticator = init_authenticator(settings)?;
    let mailer = init_mailer(settings)?;

    let (guestbook_repo, comments_repo): (Arc<dyn GuestbookRepo>, Arc<dyn CommentsRepo>) =
        match db.as_ref() {
            Some(db) => (
                db.clone() as Arc<dyn GuestbookRepo>,
                db.clone() as Arc<dyn CommentsRepo>,
            ),
            None => (
                Arc::new(MemoryGuestbookRepo::default()),
                Arc::new(MemoryCommentsRepo::new(Vec::new())),
            ),
        };

    let cache = CacheAside::new(storage.kv.clone());
    let content_service = ContentService::new(
        content.clone(),
        storage.kv.clone(),
        settings.content.page_size.get(),
    );
    let syndication = SyndicationService::new(
        content.clone(),
        cache.clone(),
        site.clone(),
        settings.content.feed_limit.get(),
        settings.cache.feed_ttl_seconds,
    );
    let sitemap = SitemapService::new(
        content,
        cache,
        site.clone(),
        RobotsRules::default(),
        settings.content.sitemap_limit.get(),
        settings.cache.sitemap_ttl_seconds,
    );

    let notification = settings
        .mail
        .notify_to
        .clone()
        .map(|recipient| NotificationSettings {
            recipient,
            site_title: site.title.clone(),
        });
    let guestbook = GuestbookService::new(
        guestbook_repo,
        storage.read_limiter,
        storage.write_limiter,
        mailer,
        notification,
        settings.guestbook.id_salt.clone(),
    );

    Ok(RouterState {
        http: HttpState {
            content: Arc::new(content_service),
            syndication: Arc::new(syndication),
            sitemap: Arc::new(sitemap),
            site,
            db,
        },
        api: ApiState {
            guestbook: Arc::new(guestbook),
            comments: Arc::new(CommentsService::new(comments_repo)),
            authenticator,
        },
    })
}
