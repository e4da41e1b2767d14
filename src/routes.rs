use crate::{
    api::{attendance, cv, employee, leave_request, mail_template, payroll, training},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/send-otp")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::send_otp)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::reset_password)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/employee")
                    // fixed segments must register before /{id}
                    .service(
                        web::resource("/report").route(web::get().to(employee::employee_report)),
                    )
                    .service(
                        web::resource("/csv").route(web::post().to(employee::import_employees_csv)),
                    )
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    .service(
                        web::resource("/{id}/status")
                            .route(web::put().to(employee::update_status)),
                    )
                    .service(
                        web::resource("/{id}/photo")
                            .route(web::put().to(employee::upload_photo))
                            .route(web::delete().to(employee::remove_photo)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/report")
                            .route(web::get().to(attendance::attendance_report)),
                    )
                    .service(
                        web::resource("").route(web::get().to(attendance::list_attendance)),
                    ),
            )
            .service(
                web::scope("/leave")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave))),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("/upload").route(web::post().to(payroll::upload_payroll)),
                    )
                    .service(
                        web::resource("/payslip/{id}")
                            .route(web::get().to(payroll::get_payslip)),
                    )
                    .service(web::resource("").route(web::get().to(payroll::list_payrolls))),
            )
            .service(
                web::scope("/training")
                    .service(
                        web::resource("/register/{id}")
                            .route(web::put().to(training::update_registration)),
                    )
                    .service(
                        web::resource("/register")
                            .route(web::post().to(training::register_training)),
                    )
                    .service(
                        web::resource("/csv").route(web::post().to(training::import_trainings_csv)),
                    )
                    .service(
                        web::resource("/report").route(web::get().to(training::training_report)),
                    )
                    .service(
                        web::resource("")
                            .route(web::get().to(training::list_trainings))
                            .route(web::post().to(training::create_training)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(training::get_training))
                            .route(web::put().to(training::update_training))
                            .route(web::delete().to(training::delete_training)),
                    ),
            )
            .service(
                web::scope("/cv")
                    .service(
                        web::resource("")
                            .route(web::get().to(cv::list_cvs))
                            .route(web::post().to(cv::create_cv)),
                    )
                    .service(web::resource("/{id}").route(web::put().to(cv::update_cv))),
            )
            .service(
                web::scope("/template")
                    .service(
                        web::resource("/send-mail")
                            .route(web::post().to(mail_template::send_mail)),
                    )
                    .service(
                        web::resource("")
                            .route(web::get().to(mail_template::list_templates))
                            .route(web::post().to(mail_template::create_template)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(mail_template::update_template)),
                    ),
            ),
    );
}
